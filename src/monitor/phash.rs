use anyhow::Result;
use image::ImageFormat;
use image_hasher::{HashAlg, HasherConfig, ImageHash};

pub fn compute_phash(png_bytes: &[u8]) -> Result<ImageHash> {
    let img = image::load_from_memory_with_format(png_bytes, ImageFormat::Png)?;
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::DoubleGradient)
        .hash_size(8, 8)
        .to_hasher();

    Ok(hasher.hash_image(&img))
}

/// Largest Hamming distance between perceptual hashes of consecutive frames.
/// `None` for fewer than two frames.
pub fn change_score(pngs: &[Vec<u8>]) -> Result<Option<u32>> {
    let hashes = pngs
        .iter()
        .map(|png| compute_phash(png))
        .collect::<Result<Vec<_>>>()?;

    Ok(hashes
        .windows(2)
        .map(|pair| pair[0].dist(&pair[1]))
        .max())
}
