use super::*;
use crate::frame::FrameOwned;

#[test]
fn parse_pair_single_value_duplicates() {
    assert_eq!((8, 8), parse_pair("8").unwrap());
    assert_eq!((2, 3), parse_pair("2,3").unwrap());
}

#[test]
fn parse_pair_rejects_garbage() {
    assert!(parse_pair("").is_err());
    assert!(parse_pair("a").is_err());
    assert!(parse_pair("1,b").is_err());
    assert!(parse_pair("1,2,3").is_err());
}

#[test]
fn frame_hash_tracks_content_and_shape() {
    let mut a = FrameOwned::new();
    a.resize(4, 2, 8);
    let mut b = FrameOwned::new();
    b.resize(4, 2, 8);
    assert_eq!(frame_hash(&a), frame_hash(&b));

    b.write::<u8>(0, 0, 1);
    assert_ne!(frame_hash(&a), frame_hash(&b));

    let mut c = FrameOwned::new();
    c.resize(2, 4, 8);
    assert_ne!(frame_hash(&a), frame_hash(&c));
}
