/*
 * Copyright (c) 2022. XIMEA GmbH - All Rights Reserved
 */

use std::mem::size_of;
use std::slice::from_raw_parts;

use xiapi_sys::XI_IMG;

/// An image as it sits in the SDK's acquisition buffer.
///
/// The pixels are only borrowed; use [crate::Frame] to keep a copy.
pub struct Image<'a, T> {
    pub(crate) xi_img: XI_IMG,
    pub(crate) pix_type: std::marker::PhantomData<&'a T>,
}

impl<'a, T> Image<'a, T> {
    /// Get a Pixel from the image.
    ///
    /// # Arguments
    ///
    /// * `x`: Horizontal coordinate of the requested pixel.
    /// * `y`: Vertical coordinate of the requested pixel.
    ///
    /// returns: Option<&T> A reference to the pixel
    pub fn pixel(&self, x: usize, y: usize) -> Option<&T> {
        if x >= self.width() as usize {
            return None;
        }
        self.row(y).map(|row| &row[x])
    }

    /// Get one line of pixels, without the alignment padding.
    pub fn row(&self, y: usize) -> Option<&[T]> {
        let buffer = self.xi_img.bp as *const u8;
        if buffer.is_null() || y >= self.height() as usize {
            return None;
        }
        let len = self.width() as usize;
        unsafe {
            let start = buffer.add(self.stride() * y) as *const T;
            Some(from_raw_parts(start, len))
        }
    }

    /// Iterate over all lines of the image.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.height() as usize).filter_map(move |y| self.row(y))
    }

    /// Total length of a line in bytes, padding included.
    pub fn stride(&self) -> usize {
        self.xi_img.width as usize * size_of::<T>() + self.xi_img.padding_x as usize
    }

    /// Get the width of this image in pixels
    pub fn width(&self) -> u32 {
        self.xi_img.width
    }

    /// Get the height of this image
    pub fn height(&self) -> u32 {
        self.xi_img.height
    }

    /// Frame number
    pub fn nframe(&self) -> u32 {
        self.xi_img.nframe
    }

    /// Raw 64-bit timestamp from the camera. Interpretation of this value differs between camera series.
    /// xiQ, xiD: 40-bit microsecond number - (overlaps after 305 hours)
    /// xiC, xiB, xiT, xiX: 64-bit 4 nanosecond number (overlaps after 2339 years)
    pub fn timestamp_raw(&self) -> u64 {
        let high = self.xi_img.tsSec as u64;
        let low = self.xi_img.tsUSec as u64;
        (high << 32) | low
    }

    /// Get the raw image data as a slice, padding included.
    pub fn data(&'a self) -> &'a [T] {
        if self.xi_img.bp.is_null() {
            return &[];
        }
        let length = if self.xi_img.bp_size != 0 {
            self.xi_img.bp_size as usize / size_of::<T>()
        } else {
            self.stride() * self.height() as usize / size_of::<T>()
        };
        unsafe { from_raw_parts(self.xi_img.bp as *const T, length) }
    }
}

impl<T: Copy> Image<'_, T> {
    /// Copy the pixels into a tightly packed vector.
    pub fn to_packed_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.width() as usize * self.height() as usize);
        for row in self.rows() {
            out.extend_from_slice(row);
        }
        out
    }
}
