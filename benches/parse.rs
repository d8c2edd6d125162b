//! Announce parser throughput.

use std::collections::HashMap;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use snatchd::announce::AnnounceParser;
use snatchd::indexer::IndexerRegistry;

fn parser(identifier: &str, settings: &[(&str, &str)]) -> AnnounceParser {
    let registry = IndexerRegistry::load_bundled().unwrap();
    let def = registry.get(identifier).unwrap();
    let settings: HashMap<String, String> = settings
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AnnounceParser::new(def, settings).unwrap()
}

fn bench_parse(c: &mut Criterion) {
    let redacted = parser("redacted", &[("authkey", "AK"), ("torrent_pass", "TP")]);
    let redacted_line = "Artist - Album [2008] [Single] - FLAC / Lossless / Log / 100% / Cue / CD - \
                         https://redacted.ch/torrents.php?id=123 / \
                         https://redacted.ch/torrents.php?action=download&id=123 - \
                         hip.hop,rhythm.and.blues,2000s";

    c.bench_function("parse_redacted_announce", |b| {
        b.iter(|| redacted.parse(black_box(redacted_line)))
    });

    c.bench_function("parse_miss", |b| {
        b.iter(|| redacted.parse(black_box("unrelated channel chatter")))
    });

    let digitalcore = parser("digitalcore", &[("passkey", "PK")]);
    let dc_line = "NEW TORRENT in Movies/XviD :: This.is.my.Movie.2019.BRRip.XviD.AC3-iND :: \
                   https://digitalcore.club/api/v1/torrents/download/00000";

    c.bench_function("parse_digitalcore_announce", |b| {
        b.iter(|| digitalcore.parse(black_box(dc_line)))
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
