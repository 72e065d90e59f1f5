use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::Error;
use crate::frame::FrameData;

#[cfg(test)]
#[path = "./tools_test.rs"]
mod tools_test;

/// parses "N" into (N, N) and "R,C" into (R, C)
pub fn parse_pair(s: &str) -> Result<(i32, i32), Error> {
    let bad = || Error::InvalidArgument(format!("expected <n> or <n,m>, got {:?}", s));
    let mut parts = s.split(',');

    let first: i32 = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .ok_or_else(bad)?;

    match parts.next() {
        None => Ok((first, first)),
        Some(second) => {
            let second: i32 = second.trim().parse().map_err(|_| bad())?;
            if parts.next().is_some() {
                return Err(bad());
            }
            Ok((first, second))
        }
    }
}

/// content identity of a frame, used to skip reprocessing unchanged
/// (or unchanged-bad) input
pub fn frame_hash(frame: &FrameData) -> u64 {
    let mut hasher = DefaultHasher::new();
    frame.width.hash(&mut hasher);
    frame.height.hash(&mut hasher);
    frame.bpp.hash(&mut hasher);
    frame.as_slice().hash(&mut hasher);
    hasher.finish()
}
