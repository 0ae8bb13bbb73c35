//! Choosing which samples along an axis get a tick label.

#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error("Tick stride must be at least 1")]
    ZeroStride,
}

/// Indices `0, stride, 2*stride, ...` below `len`. There are `ceil(len / stride)` of them.
pub fn downsample(len: usize, stride: usize) -> Result<Vec<usize>, TickError> {
    if stride == 0 {
        return Err(TickError::ZeroStride);
    }
    Ok((0..len).step_by(stride).collect())
}

/// The labels at the indices returned by [`downsample`], paired with their index.
pub fn downsample_labels<T: Clone>(labels: &[T], stride: usize) -> Result<Vec<(usize, T)>, TickError> {
    Ok(downsample(labels.len(), stride)?
        .into_iter()
        .map(|i| (i, labels[i].clone()))
        .collect())
}
