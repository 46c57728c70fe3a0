//! Compatibility-critical constants.
//!
//! These bound what the client will ever believe from an untrusted server.
//! Do not change them without also changing the deployed server, since a
//! server that emits dimensions or page counts outside these bounds will
//! simply be rejected by an older client.

/// Largest page count the client will accept from the server.
pub const MAX_PAGES: u32 = 10_000;

/// Largest image width, in pixels, the client will accept.
pub const MAX_IMG_WIDTH: u32 = 10_000;

/// Largest image height, in pixels, the client will accept.
pub const MAX_IMG_HEIGHT: u32 = 10_000;

/// Bits per channel in the raw RGB wire format. Never anything else.
pub const DEPTH: u8 = 8;

/// Channels per pixel in the raw RGB wire format (no alpha).
pub const CHANNELS: u32 = 3;
