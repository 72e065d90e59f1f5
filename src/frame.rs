// frame descriptors over raw pixel storage.
//
// FrameData describes a rectangular pixel grid somewhere in memory: an
// owned buffer, an SDL texture lock, or an mmap'd framebuffer all look
// the same to the passes. Pixel writes go through &self so that the
// pass scheduler can hand one frame to many workers; the contract is
// that concurrent writers touch disjoint rows (the scheduler's row
// partition guarantees this, and every dispatch ends in a barrier).

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::sync::Arc;

use image::{ImageBuffer, Rgb};

use crate::pixel::{FMT_A8R8G8B8, FMT_R5G6B5};

#[cfg(test)]
#[path = "./frame_test.rs"]
mod frame_test;

pub const DEFAULT_ASPECT_RATIO: f32 = 4.0 / 3.0;

pub struct FrameData {
    pub width: i32,
    pub height: i32,
    /// bits per pixel; 4 and 8 are packed CGA, 64/96 are float planes
    pub bpp: i32,
    /// bytes per row, at least (width * bpp + 7) / 8
    pub pitch: i32,
    /// physical display aspect, independent of the pixel count
    pub aspect_ratio: f32,
    data: *mut u8,
    len: usize,
}

// the row-disjointness contract above is what makes sharing sound
unsafe impl Send for FrameData {}
unsafe impl Sync for FrameData {}

impl FrameData {
    pub fn empty() -> Self {
        FrameData {
            width: 0,
            height: 0,
            bpp: 0,
            pitch: 0,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            data: ptr::null_mut(),
            len: 0,
        }
    }

    /// wrap foreign pixel storage (texture lock, mmap'd screen).
    ///
    /// The caller keeps the memory alive and writable for the lifetime
    /// of the descriptor.
    pub unsafe fn from_raw_parts(
        data: *mut u8,
        width: i32,
        height: i32,
        pitch: i32,
        bpp: i32,
        aspect_ratio: f32,
    ) -> Self {
        FrameData {
            width,
            height,
            bpp,
            pitch,
            aspect_ratio,
            data,
            len: (pitch * height) as usize,
        }
    }

    pub fn bytes(&self) -> usize {
        (self.pitch * self.height) as usize
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_null() && self.len > 0
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        debug_assert!(x >= 0 && x < self.width, "x {} outside 0..{}", x, self.width);
        debug_assert!(y >= 0 && y < self.height, "y {} outside 0..{}", y, self.height);
        (y * self.pitch) as usize + (x * self.bpp / 8) as usize
    }

    /// read the pixel value at (x, y) as T (u8/u16/u32 or float arrays)
    pub fn read<T: Copy>(&self, x: i32, y: i32) -> T {
        let off = self.offset(x, y);
        debug_assert!(off + std::mem::size_of::<T>() <= self.len);
        unsafe { ptr::read_unaligned(self.data.add(off) as *const T) }
    }

    /// write the pixel value at (x, y).
    ///
    /// Takes &self: the storage is interiorly mutable so workers can
    /// fill disjoint rows of a shared frame. See the module contract.
    pub fn write<T: Copy>(&self, x: i32, y: i32, value: T) {
        let off = self.offset(x, y);
        debug_assert!(off + std::mem::size_of::<T>() <= self.len);
        unsafe { ptr::write_unaligned(self.data.add(off) as *mut T, value) }
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.data.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }

    /// render a 32 bpp (a8r8g8b8) or 16 bpp (r5g6b5) frame to an image
    pub fn draw_image(&self) -> ImageBuffer<Rgb<u8>, Vec<u8>> {
        let mut img = ImageBuffer::new(self.width.max(0) as u32, self.height.max(0) as u32);
        for y in 0..self.height {
            for x in 0..self.width {
                let srgb = match self.bpp {
                    16 => FMT_R5G6B5.to_float_srgb(u32::from(self.read::<u16>(x, y))),
                    32 => FMT_A8R8G8B8.to_float_srgb(self.read::<u32>(x, y)),
                    _ => [0.0, 0.0, 0.0],
                };
                let px = Rgb([
                    (srgb[0] * 255.0 + 0.5) as u8,
                    (srgb[1] * 255.0 + 0.5) as u8,
                    (srgb[2] * 255.0 + 0.5) as u8,
                ]);
                img.put_pixel(x as u32, y as u32, px);
            }
        }
        img
    }
}

/// frame with owned, resizable storage
pub struct FrameOwned {
    frame: FrameData,
    buf: Vec<u8>,
}

impl FrameOwned {
    pub fn new() -> Self {
        FrameOwned {
            frame: FrameData::empty(),
            buf: Vec::new(),
        }
    }

    /// resize with the minimal pitch for the given bpp
    pub fn resize(&mut self, width: i32, height: i32, bpp: i32) {
        let pitch = (width * bpp + 7) / 8;
        self.resize_with_pitch(width, height, pitch, bpp);
    }

    /// resize to an explicit pitch (>= the minimal row width).
    ///
    /// Existing content is kept when the shape is unchanged; a reshape
    /// zeroes the buffer.
    pub fn resize_with_pitch(&mut self, width: i32, height: i32, pitch: i32, bpp: i32) {
        debug_assert!(pitch >= (width * bpp + 7) / 8);
        let len = (pitch * height) as usize;
        let same = self.frame.width == width
            && self.frame.height == height
            && self.frame.pitch == pitch
            && self.frame.bpp == bpp;
        if !same {
            self.buf.clear();
            self.buf.resize(len, 0);
        }
        self.frame.width = width;
        self.frame.height = height;
        self.frame.pitch = pitch;
        self.frame.bpp = bpp;
        self.frame.data = self.buf.as_mut_ptr();
        self.frame.len = len;
    }

    pub fn copy_from(&mut self, other: &FrameData) {
        self.resize_with_pitch(other.width, other.height, other.pitch, other.bpp);
        self.frame.aspect_ratio = other.aspect_ratio;
        self.buf.copy_from_slice(other.as_slice());
    }

    pub fn fill(&mut self, value: u8) {
        for b in self.buf.iter_mut() {
            *b = value;
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Default for FrameOwned {
    fn default() -> Self {
        FrameOwned::new()
    }
}

impl Deref for FrameOwned {
    type Target = FrameData;

    fn deref(&self) -> &FrameData {
        &self.frame
    }
}

impl DerefMut for FrameOwned {
    fn deref_mut(&mut self) -> &mut FrameData {
        &mut self.frame
    }
}

/// side-output frame shared between passes (blur intermediates, the
/// local-contrast moment buffer).
///
/// Reshaped only from pass init, which the scheduler runs
/// single-threaded; workers then read/write disjoint rows through the
/// FrameData view. The pass barrier orders writers before readers.
pub struct SharedFrame(UnsafeCell<FrameOwned>);

unsafe impl Send for SharedFrame {}
unsafe impl Sync for SharedFrame {}

impl SharedFrame {
    pub fn new() -> Arc<Self> {
        Arc::new(SharedFrame(UnsafeCell::new(FrameOwned::new())))
    }

    /// reshape the backing store; init-time only
    pub fn resize(&self, width: i32, height: i32, bpp: i32) {
        unsafe { (*self.0.get()).resize(width, height, bpp) }
    }

    pub fn frame(&self) -> &FrameData {
        unsafe { &*self.0.get() }
    }
}
