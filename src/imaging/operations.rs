//! Transform executor.
//!
//! Applies an [`OperationSet`] to a [`SourceImage`] as a fixed sequence of
//! stages. Each stage takes the previous stage's value by move and returns a
//! new one, so the order below is the only order the code can run in:
//!
//! ```text
//! decode → resize → orient → resolve output → encode
//! ```
//!
//! Resolution of the output format is pure and depends on the source
//! (declared content type, sniffed container, SVG-ness); encoding may be
//! skipped entirely when nothing about the image changed.

use super::backend::{BackendError, Decoded, ImageBackend};
use super::format::{OCTET_STREAM, OutputFormat, is_svg_content_type, looks_like_svg};
use super::params::{EncodeParams, ResizeParams};
use crate::directive::{DirectiveError, OperationSet};
use crate::types::{SourceImage, TransformResult};
use image::metadata::Orientation;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("invalid directive: {0}")]
    Directive(#[from] DirectiveError),
    #[error("image backend: {0}")]
    Backend(#[from] BackendError),
}

/// What the source looks like, independent of the pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceInfo {
    /// Declared content type, or sniffed format when undeclared/unknown.
    format: Option<OutputFormat>,
    declared: Option<String>,
    vector: bool,
}

impl SourceInfo {
    fn inspect(source: &SourceImage) -> Self {
        let declared = source.content_type.clone();
        let vector = declared.as_deref().is_some_and(is_svg_content_type)
            || looks_like_svg(&source.bytes);
        Self {
            format: declared.as_deref().and_then(OutputFormat::from_content_type),
            declared,
            vector,
        }
    }

    /// Content type reported when the source bytes pass through unchanged.
    fn passthrough_content_type(&self) -> String {
        match (self.format, &self.declared) {
            (Some(format), _) => format.content_type().to_string(),
            (None, Some(declared)) => declared.clone(),
            (None, None) => OCTET_STREAM.to_string(),
        }
    }
}

/// An image moving through the stages, plus whether any stage changed it.
struct Stage<I> {
    image: I,
    orientation: Orientation,
    modified: bool,
}

/// Stage 1: decode, and fall back to the sniffed container format.
fn decode<B: ImageBackend>(
    backend: &B,
    source: &SourceImage,
    info: &mut SourceInfo,
) -> Result<Stage<B::Image>, BackendError> {
    let Decoded {
        image,
        orientation,
        detected,
    } = backend.decode(&source.bytes, info.vector)?;
    if info.format.is_none() && !info.vector {
        info.format = detected;
    }
    Ok(Stage {
        image,
        orientation,
        modified: false,
    })
}

/// Stage 2: resize when a width or height was requested.
fn resize<B: ImageBackend>(
    backend: &B,
    stage: Stage<B::Image>,
    ops: &OperationSet,
) -> Result<Stage<B::Image>, BackendError> {
    let Some(params) = ResizeParams::requested(ops.width, ops.height) else {
        return Ok(stage);
    };
    Ok(Stage {
        image: backend.resize(stage.image, &params)?,
        orientation: stage.orientation,
        modified: true,
    })
}

/// Stage 3: undo EXIF orientation whenever the metadata declares one.
fn orient<B: ImageBackend>(
    backend: &B,
    stage: Stage<B::Image>,
) -> Result<Stage<B::Image>, BackendError> {
    if stage.orientation == Orientation::NoTransforms {
        return Ok(stage);
    }
    Ok(Stage {
        image: backend.orient(stage.image, stage.orientation)?,
        orientation: Orientation::NoTransforms,
        modified: true,
    })
}

/// Stage 4: choose the output encoding.
///
/// An explicit `format` wins. Otherwise the source format is kept, except
/// that vector sources become PNG; sources in a format we cannot emit are
/// re-encoded as PNG. `quality` only survives for lossy targets.
fn resolve_output(ops: &OperationSet, info: &SourceInfo) -> EncodeParams {
    let format = match (ops.format, info.vector, info.format) {
        (Some(requested), _, _) => requested,
        (None, true, _) => OutputFormat::Png,
        (None, false, Some(source)) => source,
        (None, false, None) => OutputFormat::Png,
    };
    EncodeParams {
        format,
        quality: ops.quality.filter(|_| format.is_lossy()),
    }
}

/// True when re-encoding would only reproduce the source.
fn is_passthrough(
    stage_modified: bool,
    ops: &OperationSet,
    info: &SourceInfo,
    params: &EncodeParams,
) -> bool {
    !stage_modified
        && !info.vector
        && params.quality.is_none()
        && ops.format.is_none_or(|requested| Some(requested) == info.format)
}

/// Stage 5: encode, or hand back the source bytes untouched.
fn encode<B: ImageBackend>(
    backend: &B,
    stage: Stage<B::Image>,
    source: &SourceImage,
    ops: &OperationSet,
    info: &SourceInfo,
) -> Result<TransformResult, BackendError> {
    let params = resolve_output(ops, info);
    if is_passthrough(stage.modified, ops, info, &params) {
        debug!("source passes through unchanged");
        return Ok(TransformResult::new(
            source.bytes.clone(),
            info.passthrough_content_type(),
        ));
    }
    let bytes = backend.encode(&stage.image, &params)?;
    Ok(TransformResult::new(bytes, params.format.content_type()))
}

/// Run every stage over `source`.
pub fn transform<B: ImageBackend>(
    backend: &B,
    source: &SourceImage,
    ops: &OperationSet,
) -> Result<TransformResult, TransformError> {
    let mut info = SourceInfo::inspect(source);
    let decoded = decode(backend, source, &mut info)?;
    let resized = resize(backend, decoded, ops)?;
    let oriented = orient(backend, resized)?;
    let result = encode(backend, oriented, source, ops, &info)?;
    debug!(
        content_type = %result.content_type,
        bytes = result.len(),
        "transform complete"
    );
    Ok(result)
}
