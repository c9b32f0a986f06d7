use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::crs::Crs;
use crate::grid::RasterGrid;
use crate::io::write_output;

/// Value written to cells no shape touched, also declared as the band's nodata.
pub const NODATA: f32 = 0.0;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// Destination for a finished heatmap.
pub trait RasterWriter: Send + Sync {
    fn write(&self, path: &Path, data: &Array2<f32>, grid: &RasterGrid, crs: &Crs) -> Result<()>;
}

/// Single band float32 GeoTIFF, north-up, georeferenced through the GeoKey tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffWriter {
    atomic: bool,
}

impl GeoTiffWriter {
    /// With `atomic`, the file only appears at its final path once fully written.
    pub fn new(atomic: bool) -> Self { Self { atomic } }

    /// Encode to an in-memory TIFF.
    pub fn encode(data: &Array2<f32>, grid: &RasterGrid, crs: &Crs) -> Result<Vec<u8>> {
        let (rows, cols) = data.dim();
        if (rows, cols) != grid.shape() {
            anyhow::bail!("raster is {rows}x{cols} but the grid is {:?}", grid.shape());
        }

        let b = grid.out_bounds();
        let scale = [grid.cell_size(), grid.cell_size(), 0.0];
        let tiepoint = [0.0, 0.0, 0.0, b.west, b.north, 0.0];
        let geokeys = geo_key_directory(crs);
        let pixels: Vec<f32> = data.iter().copied().collect();

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buffer).context("Failed to start TIFF encoder")?;
            let mut image = encoder
                .new_image::<colortype::Gray32Float>(u32::try_from(cols)?, u32::try_from(rows)?)
                .context("Failed to start TIFF image")?;

            let dir = image.encoder();
            dir.write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &scale[..])?;
            dir.write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])?;
            dir.write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), &geokeys[..])?;
            dir.write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), format!("{NODATA}").as_str())?;

            image.write_data(&pixels).context("Failed to write raster band")?;
        }
        Ok(buffer.into_inner())
    }
}

impl RasterWriter for GeoTiffWriter {
    fn write(&self, path: &Path, data: &Array2<f32>, grid: &RasterGrid, crs: &Crs) -> Result<()> {
        let bytes = Self::encode(data, grid, crs)?;
        write_output(path, &bytes, self.atomic)
            .with_context(|| format!("Failed to write raster {}", path.display()))
    }
}

/// GeoKeyDirectory: header then (key, location, count, value) entries, sorted by key.
fn geo_key_directory(crs: &Crs) -> Vec<u16> {
    let geographic = crs.is_geographic();
    let mut keys: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE, 0, 1, if geographic { 2 } else { 1 }],
        [GT_RASTER_TYPE, 0, 1, 1], // PixelIsArea
    ];
    match crs.epsg().and_then(|code| u16::try_from(code).ok()) {
        Some(code) if geographic => keys.push([GEOGRAPHIC_TYPE, 0, 1, code]),
        Some(code) => keys.push([PROJECTED_CS_TYPE, 0, 1, code]),
        None => log::warn!("{crs} has no EPSG code; GeoTIFF will carry no CRS key"),
    }

    let mut dir = vec![1, 1, 0, keys.len() as u16];
    dir.extend(keys.into_iter().flatten());
    dir
}
