//! Texel access macros
//!
//! The software device reads and writes texels in its hottest loops. Every
//! index it produces is clamped to the texture first, so release builds skip
//! the bounds check while debug builds keep it and panic with a clear error.
//!
//! Usage:
//! ```rust
//! use curlnoise_engine::texel;
//!
//! let mut texels = vec![[0.0f32; 4]; 4];
//! // Write: texel!(slice, [index] = value)
//! texel!(texels, [2] = [1.0, 0.5, 0.25, 1.0]);
//! // Read: texel!(slice, [index])
//! let t = texel!(texels, [2]);
//! assert_eq!(t[1], 0.5);
//! ```

/// Copying texel read / write
///
/// - Debug: indexing with bounds checks
/// - Release: `get_unchecked` / `get_unchecked_mut`
#[macro_export]
macro_rules! texel {
    ($texels:expr, [$index:expr]) => {{
        #[cfg(debug_assertions)]
        {
            $texels[$index]
        }
        #[cfg(not(debug_assertions))]
        {
            unsafe { *$texels.get_unchecked($index) }
        }
    }};

    ($texels:expr, [$index:expr] = $val:expr) => {{
        #[cfg(debug_assertions)]
        {
            $texels[$index] = $val;
        }
        #[cfg(not(debug_assertions))]
        {
            unsafe {
                *$texels.get_unchecked_mut($index) = $val;
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn texel_read_copies_value() {
        let texels = vec![[1.0f32, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        let t = texel!(texels, [1]);
        assert_eq!(t, [5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn texel_write_replaces_value() {
        let mut texels = vec![[0.0f32; 4]; 3];
        texel!(texels, [2] = [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(texels[2], [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(texels[0], [0.0; 4]);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn texel_bounds_check_debug() {
        let texels = vec![[0.0f32; 4]; 2];
        let _ = texel!(texels, [7]);
    }
}
