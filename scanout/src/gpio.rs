// BCM2835 GPIO line driver over /dev/gpiomem. Only the three
// registers the scan loop needs: function select, set and clear.

use cgacast::error::Error;
use cgacast::scan::SignalLines;

const GPIO_LEN: usize = 4096;

// word offsets into the GPIO register window
const GPFSEL0: usize = 0;
const GPSET0: usize = 7;
const GPCLR0: usize = 10;

pub struct Bcm2835Gpio {
    base: *mut u32,
}

// the mmap stays valid for the lifetime of the process
unsafe impl Send for Bcm2835Gpio {}

#[cfg(target_os = "linux")]
impl Bcm2835Gpio {
    /// map the GPIO register window into this process
    pub fn open() -> Result<Self, Error> {
        use std::ffi::CString;

        let path = CString::new("/dev/gpiomem").unwrap();
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDWR | libc::O_SYNC) };

        if fd < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                GPIO_LEN,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        unsafe { libc::close(fd) };

        if base == libc::MAP_FAILED {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        Ok(Bcm2835Gpio {
            base: base as *mut u32,
        })
    }
}

#[cfg(not(target_os = "linux"))]
impl Bcm2835Gpio {
    pub fn open() -> Result<Self, Error> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "gpio register window requires linux",
        )))
    }
}

impl Bcm2835Gpio {
    /// configure a line as a plain output
    pub fn set_output(&mut self, line: u32) {
        let reg = GPFSEL0 + (line / 10) as usize;
        let shift = (line % 10) * 3;

        unsafe {
            let fsel = self.base.add(reg);
            let mut v = std::ptr::read_volatile(fsel);
            v &= !(0b111 << shift); // input first
            std::ptr::write_volatile(fsel, v);
            v |= 0b001 << shift; // then output
            std::ptr::write_volatile(fsel, v);
        }
    }
}

impl SignalLines for Bcm2835Gpio {
    fn set_mask(&mut self, mask: u32) {
        if mask != 0 {
            unsafe { std::ptr::write_volatile(self.base.add(GPSET0), mask) };
        }
    }

    fn clear_mask(&mut self, mask: u32) {
        if mask != 0 {
            unsafe { std::ptr::write_volatile(self.base.add(GPCLR0), mask) };
        }
    }
}
