use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use quartet_core::{FixationColor, QuartetFrame, QuartetPair, Screen};
use quartet_render::{RenderSettings, SkiaRenderer};

fn harness() -> (SkiaRenderer, Vec<u8>) {
    let width = 1920u32;
    let height = 1080u32;
    let settings = RenderSettings {
        width,
        height,
        pixels_per_degree: 44.73,
        square_size_deg: 1.0,
        fixation_radius_deg: 0.15,
        text_height_deg: 0.5,
        background_rgb: [0, 0, 0],
        square_rgb: [255, 255, 255],
    };
    let r = SkiaRenderer::new(settings, None).unwrap();
    let fb = vec![0u8; (width * height * 4) as usize];
    (r, fb)
}

pub fn bench_screens(c: &mut Criterion) {
    let mut g = c.benchmark_group("render_frame");
    g.sample_size(40);

    let quartet = Screen::Quartet(QuartetFrame::at_ratio(QuartetPair::LeftTilted, 1.0, 2.5));
    g.bench_function("quartet_frame", |b| {
        b.iter_batched(
            harness,
            |(mut r, mut fb)| {
                let stats = r.render_frame(&quartet, &mut fb);
                black_box(stats.ok());
            },
            BatchSize::LargeInput,
        )
    });

    let fixation = Screen::Fixation(FixationColor::Red);
    g.bench_function("fixation_frame", |b| {
        let (mut r, mut fb) = harness();
        b.iter(|| black_box(r.render_frame(&fixation, &mut fb).ok()))
    });

    g.finish();
}

criterion_group!(benches, bench_screens);
criterion_main!(benches);
