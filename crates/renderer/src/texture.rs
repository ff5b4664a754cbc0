//! CPU-staged data textures with upload-on-bind.
//!
//! `DataTexture<T>` keeps a dense, row-major copy of 1D/2D/3D sample data and
//! only transfers it to the GPU the next time [`DataTexture::bind`] runs with a
//! pending upload. Several writes inside one frame therefore collapse into a
//! single transfer. `FloatTexture` stages `f32` texels (converted from `f64`
//! input), `ByteTexture` stages 8-bit texels such as the marker glyph raster.

use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::Pod;

use crate::gpu::RenderContext;

/// Largest rank a data texture can upload (3D volume).
pub const MAX_RANK: usize = 3;

/// Shared by every texture so a generation never names two GPU objects.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Scalar type stored per texel component.
pub trait TexelScalar: Pod + Default + 'static {
    /// Value written into the padding channel when three components are
    /// widened to four for upload.
    const OPAQUE: Self;

    fn from_f64(value: f64) -> Self;

    /// GPU format for the given component count, or `None` when unsupported.
    fn texture_format(components: u32) -> Option<wgpu::TextureFormat>;
}

impl TexelScalar for f32 {
    const OPAQUE: Self = 1.0;

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn texture_format(components: u32) -> Option<wgpu::TextureFormat> {
        match components {
            1 => Some(wgpu::TextureFormat::R32Float),
            2 => Some(wgpu::TextureFormat::Rg32Float),
            3 | 4 => Some(wgpu::TextureFormat::Rgba32Float),
            _ => None,
        }
    }
}

impl TexelScalar for u8 {
    const OPAQUE: Self = u8::MAX;

    fn from_f64(value: f64) -> Self {
        value as u8
    }

    fn texture_format(components: u32) -> Option<wgpu::TextureFormat> {
        match components {
            1 => Some(wgpu::TextureFormat::R8Unorm),
            2 => Some(wgpu::TextureFormat::Rg8Unorm),
            3 | 4 => Some(wgpu::TextureFormat::Rgba8Unorm),
            _ => None,
        }
    }
}

pub type FloatTexture = DataTexture<f32>;
pub type ByteTexture = DataTexture<u8>;

/// View and sampler of a resident texture, ready for a bind group.
pub struct TextureBinding<'a> {
    pub view: &'a wgpu::TextureView,
    pub sampler: &'a wgpu::Sampler,
    /// Unique across all textures; changes whenever the GPU object is replaced.
    pub generation: u64,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    extent: wgpu::Extent3d,
    dimension: wgpu::TextureDimension,
    format: wgpu::TextureFormat,
}

pub struct DataTexture<T: TexelScalar> {
    label: &'static str,
    dims: [u32; MAX_RANK],
    rank: usize,
    components: u32,
    buffer: Vec<T>,
    len: usize,
    needs_upload: bool,
    gpu: Option<GpuTexture>,
    generation: u64,
}

impl<T: TexelScalar> DataTexture<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            dims: [0; MAX_RANK],
            rank: 0,
            components: 0,
            buffer: Vec::new(),
            len: 0,
            needs_upload: false,
            gpu: None,
            generation: 0,
        }
    }

    pub fn set_data_1d(&mut self, data: &[f64], size: u32, components: u32) {
        self.set_data_nd(data, &[size], components);
    }

    pub fn set_data_2d(&mut self, data: &[f64], width: u32, height: u32, components: u32) {
        self.set_data_nd(data, &[width, height], components);
    }

    pub fn set_data_3d(
        &mut self,
        data: &[f64],
        width: u32,
        height: u32,
        depth: u32,
        components: u32,
    ) {
        self.set_data_nd(data, &[width, height, depth], components);
    }

    /// Copies `product(dims) * components` values into the staging buffer and
    /// schedules an upload for the next [`bind`](Self::bind).
    ///
    /// A rank outside `1..=3` or a component count outside `1..=4` is stored as
    /// given; the upload for it is skipped later and the GPU copy stays stale.
    /// Only the overlap of `data` and the declared extent is copied.
    pub fn set_data_nd(&mut self, data: &[f64], dims: &[u32], components: u32) {
        let staging = self.reserve(dims, components);
        for (dst, src) in staging.iter_mut().zip(data) {
            *dst = T::from_f64(*src);
        }
        self.needs_upload = true;
    }

    /// Sizes the staging buffer for a 2D image and hands it out for in-place
    /// writes. Call [`commit_data`](Self::commit_data) once the texels are done.
    pub fn allocate_data_2d(&mut self, width: u32, height: u32, components: u32) -> &mut [T] {
        self.reserve(&[width, height], components)
    }

    pub fn commit_data(&mut self) {
        self.needs_upload = true;
    }

    fn reserve(&mut self, dims: &[u32], components: u32) -> &mut [T] {
        self.dims = [0; MAX_RANK];
        for (slot, value) in self.dims.iter_mut().zip(dims) {
            *slot = *value;
        }
        self.rank = dims.len();
        self.components = components;

        let n = dims
            .iter()
            .fold(components as usize, |acc, dim| acc.saturating_mul(*dim as usize));
        if self.buffer.len() < n {
            self.buffer = vec![T::default(); n];
        }
        self.len = n;
        &mut self.buffer[..n]
    }

    /// Staged texels for the current extent.
    pub fn data(&self) -> &[T] {
        &self.buffer[..self.len]
    }

    /// Texel slots held by the staging buffer; never shrinks.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn dims(&self) -> &[u32] {
        &self.dims[..self.rank.min(MAX_RANK)]
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn components(&self) -> u32 {
        self.components
    }

    pub fn needs_upload(&self) -> bool {
        self.needs_upload
    }

    /// Width and height when the texture holds 2D data.
    pub fn texture_size(&self) -> Option<(u32, u32)> {
        (self.rank == 2).then(|| (self.dims[0], self.dims[1]))
    }

    pub fn has_alpha_channel(&self) -> bool {
        self.components == 4
    }

    pub fn has_mipmaps(&self) -> bool {
        false
    }

    /// True once a GPU texture object exists for this staging buffer.
    pub fn is_resident(&self) -> bool {
        self.gpu.is_some()
    }

    /// Uploads pending data if needed and returns the resident binding.
    ///
    /// Returns `None` until a first upload succeeded.
    pub fn bind(&mut self, ctx: &RenderContext) -> Option<TextureBinding<'_>> {
        if self.needs_upload {
            self.needs_upload = false;
            self.upload(ctx);
        }
        let generation = self.generation;
        self.gpu.as_ref().map(|gpu| TextureBinding {
            view: &gpu.view,
            sampler: &gpu.sampler,
            generation,
        })
    }

    fn upload(&mut self, ctx: &RenderContext) {
        let Some(format) = T::texture_format(self.components) else {
            tracing::warn!(
                texture = self.label,
                components = self.components,
                "unsupported component count; texture upload skipped"
            );
            return;
        };
        let (dimension, extent) = match self.rank {
            1 => (
                wgpu::TextureDimension::D1,
                wgpu::Extent3d {
                    width: self.dims[0],
                    height: 1,
                    depth_or_array_layers: 1,
                },
            ),
            2 => (
                wgpu::TextureDimension::D2,
                wgpu::Extent3d {
                    width: self.dims[0],
                    height: self.dims[1],
                    depth_or_array_layers: 1,
                },
            ),
            3 => (
                wgpu::TextureDimension::D3,
                wgpu::Extent3d {
                    width: self.dims[0],
                    height: self.dims[1],
                    depth_or_array_layers: self.dims[2],
                },
            ),
            rank => {
                tracing::warn!(
                    texture = self.label,
                    rank,
                    "unsupported texture rank; texture upload skipped"
                );
                return;
            }
        };
        if extent.width == 0 || extent.height == 0 || extent.depth_or_array_layers == 0 {
            tracing::debug!(texture = self.label, "empty texture extent; upload skipped");
            return;
        }

        let reuse = self.gpu.as_ref().is_some_and(|gpu| {
            gpu.extent == extent && gpu.dimension == dimension && gpu.format == format
        });
        if !reuse {
            if let Some(old) = self.gpu.take() {
                old.texture.destroy();
            }
            self.gpu = Some(create_gpu_texture(ctx, self.label, extent, dimension, format));
            self.generation = next_generation();
        }

        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };
        let texels = widen_components(&self.buffer[..self.len], self.components);
        let channels = if self.components == 3 { 4 } else { self.components };
        let bytes_per_row = extent.width * channels * std::mem::size_of::<T>() as u32;
        ctx.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(extent.height),
            },
            extent,
        );
        tracing::trace!(
            texture = self.label,
            width = extent.width,
            height = extent.height,
            depth = extent.depth_or_array_layers,
            components = self.components,
            "uploaded data texture"
        );
    }

    /// Destroys the GPU texture. The staged data survives and is re-uploaded
    /// on the next bind.
    ///
    /// Destruction belongs on the thread owning the GPU context; releasing
    /// without one is reported and cleaned up on a best-effort basis.
    pub fn release(&mut self, ctx: Option<&RenderContext>) {
        if let Some(gpu) = self.gpu.take() {
            if ctx.is_none() {
                tracing::warn!(
                    texture = self.label,
                    "data texture released without an active GPU context"
                );
            }
            gpu.texture.destroy();
            self.needs_upload = self.len > 0;
        }
    }
}

impl<T: TexelScalar> Drop for DataTexture<T> {
    fn drop(&mut self) {
        if self.gpu.is_some() {
            self.release(None);
        }
    }
}

fn create_gpu_texture(
    ctx: &RenderContext,
    label: &str,
    extent: wgpu::Extent3d,
    dimension: wgpu::TextureDimension,
    format: wgpu::TextureFormat,
) -> GpuTexture {
    let texture = ctx.device().create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = ctx.device().create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });
    GpuTexture {
        texture,
        view,
        sampler,
        extent,
        dimension,
        format,
    }
}

/// wgpu has no three-channel formats; RGB data is padded to RGBA.
fn widen_components<T: TexelScalar>(texels: &[T], components: u32) -> Vec<T> {
    if components != 3 {
        return texels.to_vec();
    }
    let mut widened = Vec::with_capacity(texels.len() / 3 * 4);
    for rgb in texels.chunks_exact(3) {
        widened.extend_from_slice(rgb);
        widened.push(T::OPAQUE);
    }
    widened
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_are_never_reused_across_textures() {
        let first = next_generation();
        let second = next_generation();
        assert!(second > first);
        assert_ne!(first, 0);
        // an unset texture starts at 0, which no GPU object is ever tagged with
        assert_eq!(ByteTexture::new("fresh").generation, 0);
    }

    #[test]
    fn staging_converts_doubles_and_flags_upload() {
        let mut texture = FloatTexture::new("test");
        assert!(!texture.needs_upload());
        texture.set_data_2d(&[0.5, 1.5, 2.5, 3.5], 2, 2, 1);
        assert_eq!(texture.data(), &[0.5f32, 1.5, 2.5, 3.5]);
        assert_eq!(texture.texture_size(), Some((2, 2)));
        assert_eq!(texture.rank(), 2);
        assert!(texture.needs_upload());
    }

    #[test]
    fn staging_buffer_grows_but_never_shrinks() {
        let mut texture = FloatTexture::new("test");
        texture.set_data_1d(&[1.0; 8], 4, 2);
        assert_eq!(texture.capacity(), 8);

        texture.set_data_1d(&[2.0; 3], 3, 1);
        assert_eq!(texture.capacity(), 8);
        assert_eq!(texture.data(), &[2.0f32; 3]);

        texture.set_data_3d(&[3.0; 24], 2, 3, 2, 2);
        assert_eq!(texture.capacity(), 24);
        assert_eq!(texture.dims(), &[2, 3, 2]);
    }

    #[test]
    fn unsupported_layouts_are_staged_without_a_format() {
        let mut texture = FloatTexture::new("test");
        texture.set_data_1d(&[1.0; 5], 1, 5);
        assert!(texture.needs_upload());
        assert_eq!(f32::texture_format(texture.components()), None);
        assert_eq!(f32::texture_format(0), None);

        texture.set_data_nd(&[1.0; 16], &[2, 2, 2, 2], 1);
        assert_eq!(texture.rank(), 4);
        assert_eq!(texture.dims(), &[2, 2, 2]);
    }

    #[test]
    fn short_input_only_fills_the_overlap() {
        let mut texture = FloatTexture::new("test");
        texture.set_data_1d(&[7.0, 8.0], 4, 1);
        assert_eq!(texture.data(), &[7.0f32, 8.0, 0.0, 0.0]);
    }

    #[test]
    fn allocate_exposes_writable_texels() {
        let mut texture = ByteTexture::new("glyph");
        let texels = texture.allocate_data_2d(2, 2, 4);
        assert_eq!(texels.len(), 16);
        texels[3] = 255;
        assert!(!texture.needs_upload());
        texture.commit_data();
        assert!(texture.needs_upload());
        assert!(texture.has_alpha_channel());
        assert_eq!(texture.data()[3], 255);
    }

    #[test]
    fn rgb_texels_are_padded_to_rgba() {
        let widened = widen_components(&[1u8, 2, 3, 4, 5, 6], 3);
        assert_eq!(widened, vec![1, 2, 3, 255, 4, 5, 6, 255]);
        let untouched = widen_components(&[1.0f32, 2.0], 2);
        assert_eq!(untouched, vec![1.0, 2.0]);
    }

    #[test]
    fn formats_follow_component_count() {
        assert_eq!(f32::texture_format(1), Some(wgpu::TextureFormat::R32Float));
        assert_eq!(f32::texture_format(2), Some(wgpu::TextureFormat::Rg32Float));
        assert_eq!(f32::texture_format(4), Some(wgpu::TextureFormat::Rgba32Float));
        assert_eq!(u8::texture_format(4), Some(wgpu::TextureFormat::Rgba8Unorm));
        assert_eq!(u8::texture_format(5), None);
    }
}
