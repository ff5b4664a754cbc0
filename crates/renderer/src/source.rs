use std::sync::atomic::{AtomicU64, Ordering};

use crate::texture::FloatTexture;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`DataSource`]; clients compare it to notice a swapped source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("buffer holds {actual} values but {width}x{height} needs {expected}")]
    ShortBuffer {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
    #[error("data dimensions {width}x{height} overflow the address space")]
    Overflow { width: usize, height: usize },
}

/// Owner of a dense row-major `width * height` buffer of doubles.
///
/// For x/y plots the buffer is one row of interleaved pairs
/// `[x0, y0, x1, y1, ...]`, so the sample count is `width / 2`. Renderers
/// borrow the buffer read-only for the duration of one frame update and learn
/// about new contents through [`revision`](Self::revision).
pub struct DataSource {
    id: SourceId,
    data: Vec<f64>,
    width: usize,
    height: usize,
    revision: u64,
    texture: FloatTexture,
    texture_revision: Option<u64>,
}

impl DataSource {
    pub fn new() -> Self {
        Self {
            id: SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed)),
            data: Vec::new(),
            width: 0,
            height: 0,
            revision: 0,
            texture: FloatTexture::new("data source texture"),
            texture_revision: None,
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of interleaved x/y pairs held in the first row.
    pub fn sample_count(&self) -> usize {
        if self.height == 0 {
            0
        } else {
            self.width / 2
        }
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Counter bumped every time the buffer is replaced.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Copies `width * height` doubles out of `data`.
    pub fn set_data_f64(
        &mut self,
        data: &[f64],
        width: usize,
        height: usize,
    ) -> Result<(), DataSourceError> {
        let expected = width
            .checked_mul(height)
            .ok_or(DataSourceError::Overflow { width, height })?;
        if data.len() < expected || (width > 0 && height == 0) {
            return Err(DataSourceError::ShortBuffer {
                width,
                height,
                expected: expected.max(width),
                actual: data.len(),
            });
        }
        self.replace(width, height, expected, |buffer| {
            buffer.copy_from_slice(&data[..expected]);
        });
        Ok(())
    }

    /// Resizes the buffer to `width * height` and lets `write` fill it in place.
    pub fn fill_with(
        &mut self,
        width: usize,
        height: usize,
        write: impl FnOnce(&mut [f64]),
    ) -> Result<(), DataSourceError> {
        let len = width
            .checked_mul(height)
            .ok_or(DataSourceError::Overflow { width, height })?;
        self.replace(width, height, len, write);
        Ok(())
    }

    fn replace(
        &mut self,
        width: usize,
        height: usize,
        len: usize,
        write: impl FnOnce(&mut [f64]),
    ) {
        self.data.resize(len, 0.0);
        write(&mut self.data);
        self.width = width;
        self.height = height;
        self.revision = self.revision.wrapping_add(1);
        tracing::trace!(
            width,
            height,
            revision = self.revision,
            "data source updated"
        );
    }

    /// Installs a damped sine of 256 samples over `x` in `0..10`.
    pub fn set_test_data(&mut self) {
        const SAMPLES: usize = 256;
        self.replace(SAMPLES * 2, 1, SAMPLES * 2, |buffer| {
            for (i, pair) in buffer.chunks_exact_mut(2).enumerate() {
                let x = 10.0 * i as f64 / (SAMPLES - 1) as f64;
                pair[0] = x;
                pair[1] = (-0.3 * x).exp() * (2.0 * x).sin();
            }
        });
    }

    /// The buffer staged as a single-component 2D float texture.
    ///
    /// Staging happens lazily when the buffer changed since the last call;
    /// the GPU upload is deferred further until the texture is bound.
    pub fn texture(&mut self) -> &mut FloatTexture {
        if self.texture_revision != Some(self.revision) {
            self.texture.set_data_2d(
                &self.data,
                clamp_dim(self.width),
                clamp_dim(self.height),
                1,
            );
            self.texture_revision = Some(self.revision);
        }
        &mut self.texture
    }
}

impl Default for DataSource {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_dim(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
