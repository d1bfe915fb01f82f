//! Integration test: encode a synthetic photo, decode it, and run it
//! through every style combination.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use fresco_pipeline::{
    ArtStyle, ExportSize, FilterSettings, PixelBuffer, RasterStyle, RenderOptions, ResizeFilter,
    render,
};

/// A PNG with a sky gradient, a dark hill and a bright sun.
fn landscape_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        let (fx, fy) = (f64::from(x), f64::from(y));
        let sun = (fx - f64::from(width) * 0.7).hypot(fy - f64::from(height) * 0.3);
        if sun < f64::from(height) * 0.12 {
            image::Rgba([255, 240, 200, 255])
        } else if fy > f64::from(height) * 0.6 + (fx / 9.0).sin() * 6.0 {
            image::Rgba([30, 80, 40, 255])
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let blue = (255.0 - fy / f64::from(height) * 120.0) as u8;
            image::Rgba([90, 140, blue, 255])
        }
    });
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )
    .unwrap();
    buf
}

const RASTER_STYLES: [RasterStyle; 4] = [
    RasterStyle::None,
    RasterStyle::Dots,
    RasterStyle::LinesHorizontal,
    RasterStyle::LinesVertical,
];

#[test]
fn every_combination_renders_at_export_width() {
    let source = Arc::new(PixelBuffer::decode(&landscape_png(240, 160)).unwrap());
    let options = RenderOptions {
        target_width: ExportSize::Custom(120).target_width(),
        resize_filter: ResizeFilter::CatmullRom,
        ..RenderOptions::default()
    };

    for art_style in ArtStyle::ALL {
        for raster_style in RASTER_STYLES {
            let settings = FilterSettings {
                contrast: 15,
                saturation: 10,
                art_style,
                raster_style,
                ..FilterSettings::default()
            };
            let result = render(Arc::clone(&source), settings, options)
                .map_err(|e| format!("{art_style}/{raster_style}: {e}"))
                .unwrap();
            assert_eq!(
                (result.buffer.width(), result.buffer.height()),
                (120, 80),
                "{art_style}/{raster_style}"
            );
            eprintln!("{}", result.diagnostics.report());
        }
    }
}

#[test]
fn tonal_only_keeps_alpha_and_size() {
    let source = Arc::new(PixelBuffer::decode(&landscape_png(64, 48)).unwrap());
    let settings = FilterSettings {
        brightness: -40,
        shadows: 60,
        highlights: -60,
        ..FilterSettings::default()
    };
    let result = render(Arc::clone(&source), settings, RenderOptions::default()).unwrap();
    assert_eq!(result.buffer.dimensions(), source.dimensions());
    assert!(result.buffer.samples().chunks_exact(4).all(|px| px[3] == 255));
    assert_ne!(result.buffer, *source);
}

#[test]
fn halftone_of_black_is_transparent_even_after_stylize() {
    let source = Arc::new(PixelBuffer::filled(50, 40, [0, 0, 0, 255]));
    let settings = FilterSettings {
        art_style: ArtStyle::LayeredBlend,
        raster_style: RasterStyle::Dots,
        ..FilterSettings::default()
    };
    let result = render(source, settings, RenderOptions::default()).unwrap();
    assert!(result.buffer.samples().iter().all(|&s| s == 0));
}

#[test]
fn legacy_style_names_drive_the_same_render() {
    let legacy: FilterSettings =
        serde_json::from_str(r#"{"artStyle":"pointillism","rasterStyle":"dots"}"#).unwrap();
    let current = FilterSettings {
        art_style: ArtStyle::Stipple,
        raster_style: RasterStyle::Dots,
        ..FilterSettings::default()
    };
    assert_eq!(legacy, current);

    let source = Arc::new(PixelBuffer::decode(&landscape_png(40, 30)).unwrap());
    let a = render(Arc::clone(&source), legacy, RenderOptions::default()).unwrap();
    let b = render(source, current, RenderOptions::default()).unwrap();
    assert_eq!(a.buffer, b.buffer);
}

#[test]
fn diagnostics_serialize_to_json() {
    let source = Arc::new(PixelBuffer::decode(&landscape_png(32, 32)).unwrap());
    let settings = FilterSettings {
        art_style: ArtStyle::RegionMosaic,
        ..FilterSettings::default()
    };
    let result = render(source, settings, RenderOptions::default()).unwrap();
    let json = serde_json::to_value(&result.diagnostics).unwrap();
    assert!(json["stylize"]["metrics"]["Stylize"]["style"] == "region-mosaic");
    assert!(json["resize"].is_null());
}
