//! Benchmark for JSON-tree chart import and timeline build.

use std::fmt::Write;

use criterion::{Criterion, Throughput};
use judgeline::{ChartFormat, Timeline, TimelineConfig, load_chart};

struct ChartFile {
    name: String,
    source: String,
}

fn scan_chart_files() -> Vec<ChartFile> {
    let dir = "tests/files";

    std::fs::read_dir(dir)
        .expect("Failed to read directory")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && ChartFormat::from_path(path) == Some(ChartFormat::JsonTree))
        .filter_map(|path| {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(String::from)?;

            let source = std::fs::read_to_string(&path).expect("Failed to load test file");

            Some(ChartFile { name, source })
        })
        .collect()
}

/// A chart of `lines` lines with `notes` notes each, padded with keys the importer skips.
fn generated_chart(lines: usize, notes: usize) -> ChartFile {
    let mut source = String::from(
        r#"{"META":{"RPEVersion":150,"name":"generated","offset":0},"BPMList":[{"bpm":180,"startTime":[0,0,1]}],"judgeLineList":["#,
    );
    for line in 0..lines {
        if line > 0 {
            source.push(',');
        }
        let _ = write!(
            source,
            r#"{{"father":-1,"Texture":"line.png","posControl":[{{"x":0,"pos":1.0,"easing":1}}],"eventLayers":[{{"speedEvents":[{{"start":1,"end":2,"startTime":[0,0,1],"endTime":[64,0,1]}}],"moveXEvents":[{{"start":0,"end":100,"easingType":3,"startTime":[0,0,1],"endTime":[32,0,1]}}]}}],"notes":["#
        );
        for note in 0..notes {
            if note > 0 {
                source.push(',');
            }
            let _ = write!(
                source,
                r#"{{"type":{},"above":1,"isFake":0,"positionX":{}.0,"startTime":[{},{},4],"endTime":[{},0,1],"alpha":255,"visibleTime":999999.0}}"#,
                note % 4 + 1,
                (note * 37) % 900,
                note / 4,
                note % 4,
                note / 4 + 1,
            );
        }
        source.push_str("]}");
    }
    source.push_str("]}");
    ChartFile {
        name: format!("generated_{lines}x{notes}"),
        source,
    }
}

fn bench_import_json_tree(c: &mut Criterion) {
    let mut files = scan_chart_files();
    files.push(generated_chart(24, 400));
    let mut group = c.benchmark_group("import_json_tree");

    for file in files.iter() {
        group.throughput(Throughput::Bytes(file.source.len() as u64));
        group.bench_function(&file.name, |b| {
            b.iter(|| load_chart(std::hint::black_box(file.source.as_bytes()), ChartFormat::JsonTree));
        });
    }

    group.finish();
}

fn bench_build_timeline(c: &mut Criterion) {
    let file = generated_chart(24, 400);
    let chart = load_chart(file.source.as_bytes(), ChartFormat::JsonTree)
        .expect("generated chart must load");
    let mut group = c.benchmark_group("build_timeline");

    for workers in [1, 4] {
        let config = TimelineConfig::default().with_workers(workers);
        group.bench_function(format!("{}_workers_{workers}", file.name), |b| {
            b.iter(|| Timeline::build(std::hint::black_box(chart.clone()), &config));
        });
    }

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default();
    bench_import_json_tree(&mut criterion);
    bench_build_timeline(&mut criterion);
}
