//! C8: assembling re-encoded page PNGs into the final sanitized, multi-page
//! PDF.
//!
//! Builds image XObjects and page trees with `lopdf`, in the style of
//! `tagawa0525-pdf_masking`'s `pdf::writer`. Unlike that crate, which embeds
//! MRC-encoded JPEG/JBIG2 layers, we have one flat RGB raster per page,
//! Flate-compressed rather than DCT-encoded, since the pixels already went
//! through one lossy round trip on the untrusted side and a second lossy
//! encode isn't worth the size savings.
//!
//! Pages are appended to a single growing [`lopdf::Document`] in batches of
//! `batch_size`: each batch is handed to a blocking task, which attaches its
//! pages and hands the document back, so a many-thousand-page document never
//! holds more than one batch's worth of decoded rasters in memory at once.
//! Every page's re-encoded PNG is unlinked as soon as it has been embedded.

use flate2::{Compression, write::ZlibEncoder};
use lopdf::{Document as PdfDocument, Object, ObjectId, Stream, dictionary};
use std::io::Write as _;

use qvm_sanitize_protocol::SanitizeError;

use crate::{async_utils::spawn_blocking_propagating_panics, page::PageRepresentation, prelude::*};

/// How many pages to fold into the growing PDF document per blocking task,
/// and to hold in flight in the receive/re-encode queue.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Assemble `pages` (already sorted by page number) into a single PDF, `B`
/// pages at a time.
pub async fn assemble_pdf(pages: Vec<PageRepresentation>, batch_size: usize) -> Result<Vec<u8>> {
    let batch_size = batch_size.max(1);

    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());

    for chunk in pages.chunks(batch_size) {
        let chunk = chunk.to_vec();
        let (returned_doc, mut new_kids) =
            spawn_blocking_propagating_panics(move || append_batch(doc, pages_id, &chunk))
                .await
                .context("failed to assemble a batch of pages into the PDF")?;
        doc = returned_doc;
        kids.append(&mut new_kids);
    }

    let kid_count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => kid_count,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|err| {
        SanitizeError::AssemblyFailed(format!("failed to write assembled PDF: {err}"))
    })?;
    Ok(buf)
}

/// Embed one batch's worth of pages into `doc`, returning it (moved back out
/// of the blocking task) along with the new page object ids, in order.
fn append_batch(
    mut doc: PdfDocument,
    pages_id: ObjectId,
    pages: &[PageRepresentation],
) -> Result<(PdfDocument, Vec<Object>), SanitizeError> {
    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let page_id = add_image_page(&mut doc, pages_id, page)?;
        kids.push(page_id.into());
    }
    Ok((doc, kids))
}

/// Decode one page's PNG, embed it as a Flate-compressed image XObject, and
/// add a page object referencing it. Returns the new page's object id.
fn add_image_page(
    doc: &mut PdfDocument,
    pages_id: ObjectId,
    page: &PageRepresentation,
) -> Result<ObjectId, SanitizeError> {
    let decoded = image::open(&page.png_path).map_err(|err| {
        SanitizeError::AssemblyFailed(format!(
            "failed to decode re-encoded page {}: {err}",
            page.page_number
        ))
    })?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    // The re-encoded PNG has now been fully decoded into `rgb`; it has no
    // further use once this page is embedded.
    let _ = std::fs::remove_file(&page.png_path);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb.as_raw()).map_err(|err| {
        SanitizeError::AssemblyFailed(format!("failed to compress page pixels: {err}"))
    })?;
    let compressed = encoder.finish().map_err(|err| {
        SanitizeError::AssemblyFailed(format!("failed to finish compression stream: {err}"))
    })?;

    let image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    let image_id = doc.add_object(Object::Stream(Stream::new(image_dict, compressed)));

    let mut xobject_dict = lopdf::Dictionary::new();
    xobject_dict.set("Im0", Object::Reference(image_id));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => Object::Dictionary(xobject_dict),
    });

    let content = format!("q {width} 0 0 {height} 0 0 cm /Im0 Do Q").into_bytes();
    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, content)));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width as i64),
            Object::Integer(height as i64),
        ],
        "Resources" => resources_id,
        "Contents" => content_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvm_sanitize_protocol::Dimensions;

    fn write_test_png(path: &Path, width: u32, height: u32) {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        img.save(path).unwrap();
    }

    #[tokio::test]
    async fn assembles_document_with_correct_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = Vec::new();
        for n in 1..=3u32 {
            let path = dir.path().join(format!("{n}.png"));
            write_test_png(&path, 4, 4);
            pages.push(PageRepresentation {
                page_number: n,
                dimensions: Dimensions::validate(4, 4).unwrap(),
                png_path: path,
            });
        }
        let png_paths: Vec<_> = pages.iter().map(|p| p.png_path.clone()).collect();

        let bytes = assemble_pdf(pages, DEFAULT_BATCH_SIZE).await.unwrap();
        let doc = PdfDocument::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        for path in png_paths {
            assert!(!path.exists(), "consumed PNG {} was not unlinked", path.display());
        }
    }

    #[tokio::test]
    async fn assembles_pages_spanning_multiple_batches() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = Vec::new();
        for n in 1..=5u32 {
            let path = dir.path().join(format!("{n}.png"));
            write_test_png(&path, 2, 2);
            pages.push(PageRepresentation {
                page_number: n,
                dimensions: Dimensions::validate(2, 2).unwrap(),
                png_path: path,
            });
        }

        // Batch size smaller than the page count forces multiple blocking
        // appends into the same growing document.
        let bytes = assemble_pdf(pages, 2).await.unwrap();
        let doc = PdfDocument::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 5);
    }

    #[tokio::test]
    async fn assembles_page_count_beyond_default_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = Vec::new();
        for n in 1..=(DEFAULT_BATCH_SIZE as u32 + 5) {
            let path = dir.path().join(format!("{n}.png"));
            write_test_png(&path, 2, 2);
            pages.push(PageRepresentation {
                page_number: n,
                dimensions: Dimensions::validate(2, 2).unwrap(),
                png_path: path,
            });
        }

        let bytes = assemble_pdf(pages, DEFAULT_BATCH_SIZE).await.unwrap();
        let doc = PdfDocument::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), DEFAULT_BATCH_SIZE + 5);
    }
}
