use std::fmt;

/// Type-level marker for the logical coordinate space
///
/// Sizes negotiated with the layer shell live in this space.
#[derive(Debug)]
pub struct Logical;

/// Type-level marker for the physical coordinate space
///
/// Device pixels of a buffer, i.e. logical coordinates multiplied by the output scale.
#[derive(Debug)]
pub struct Physical;

/// Trait for types serving as a coordinate for other geometry utils
pub trait Coordinate: Sized + PartialEq + Copy + fmt::Debug {
    /// A Coordinate that is 0
    const ZERO: Self;
    /// Upscale the coordinate
    fn upscale(self, scale: Self) -> Self;
}

/// Implements Coordinate for an integer type.
macro_rules! integer_coordinate_impl {
    ($ty:ty, $ ($tys:ty),* ) => {
        integer_coordinate_impl!($ty);
        $(
            integer_coordinate_impl!($tys);
        )*
    };

    ($ty:ty) => {
        impl Coordinate for $ty {
            const ZERO: $ty = 0;

            #[inline]
            fn upscale(self, scale: Self) -> Self {
                self.saturating_mul(scale)
            }
        }
    };
}

integer_coordinate_impl! {
    u32,
    i32
}

/*
 * Size
 */

/// A size as defined by its width and height
///
/// Operations on sizes are saturating.
#[repr(C)]
pub struct Size<N, Kind> {
    /// horizontal coordinate
    pub w: N,
    /// vertical coordinate
    pub h: N,
    _kind: std::marker::PhantomData<Kind>,
}

impl<N: Coordinate, Kind> Size<N, Kind> {
    /// Check if this [`Size`] is empty
    ///
    /// Returns true if either the width or the height is zero
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == N::ZERO || self.h == N::ZERO
    }
}

impl<N: Coordinate> Size<N, Logical> {
    /// Convert this logical size to physical coordinate space according to given scale factor
    #[inline]
    pub fn to_physical(self, scale: N) -> Size<N, Physical> {
        Size {
            w: self.w.upscale(scale),
            h: self.h.upscale(scale),
            _kind: std::marker::PhantomData,
        }
    }
}

impl<N: fmt::Debug, S> fmt::Debug for Size<N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("Size<{}>", std::any::type_name::<S>()))?;
        f.debug_struct("")
            .field("w", &self.w)
            .field("h", &self.h)
            .finish()
    }
}

impl<N: fmt::Display, S> fmt::Display for Size<N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

impl<N, Kind> From<(N, N)> for Size<N, Kind> {
    #[inline]
    fn from((w, h): (N, N)) -> Size<N, Kind> {
        Size {
            w,
            h,
            _kind: std::marker::PhantomData,
        }
    }
}

impl<N, Kind> From<Size<N, Kind>> for (N, N) {
    #[inline]
    fn from(size: Size<N, Kind>) -> (N, N) {
        (size.w, size.h)
    }
}

impl<N: Clone, Kind> Clone for Size<N, Kind> {
    #[inline]
    fn clone(&self) -> Self {
        Size {
            w: self.w.clone(),
            h: self.h.clone(),
            _kind: std::marker::PhantomData,
        }
    }
}

impl<N: Copy, Kind> Copy for Size<N, Kind> {}

impl<N: PartialEq, Kind> PartialEq for Size<N, Kind> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.w == other.w && self.h == other.h
    }
}

impl<N: Eq, Kind> Eq for Size<N, Kind> {}

#[cfg(test)]
mod tests {
    use super::{Logical, Physical, Size};

    #[test]
    fn logical_to_physical_upscales_both_axes() {
        let size: Size<u32, Logical> = (1920, 1080).into();
        assert_eq!(size.to_physical(2), Size::<u32, Physical>::from((3840, 2160)));
    }

    #[test]
    fn upscale_saturates() {
        let size: Size<u32, Logical> = (u32::MAX, 1).into();
        assert_eq!(size.to_physical(2).w, u32::MAX);
    }

    #[test]
    fn signed_sizes_upscale() {
        let size: Size<i32, Logical> = (-3, 4).into();
        assert_eq!(size.to_physical(3), Size::<i32, Physical>::from((-9, 12)));
        assert!(Size::<i32, Logical>::from((0, -1)).is_empty());
    }

    #[test]
    fn empty_size() {
        assert!(Size::<u32, Logical>::from((0, 10)).is_empty());
        assert!(Size::<u32, Logical>::from((10, 0)).is_empty());
        assert!(!Size::<u32, Logical>::from((1, 1)).is_empty());
    }
}
