//! Registers the toy query set, streams five objects through it and prints
//! the matches, the index layout and a CSV run report.
//!
//! Run with: RUST_LOG=debug cargo run --example toy [report.csv]

use spatio_fast::prelude::*;
use spatio_fast::RunReport;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let index = FastIndex::builder()
        .bounds(Rectangle::new(0.0, 0.0, 10.0, 10.0))
        .granularity(8)
        .build()?;
    let mut report = RunReport::for_index("toy", &index);

    let everywhere = Rectangle::new(0.0, 0.0, 10.0, 10.0);
    let range_queries = vec![
        RangeQuery::new(1, ["k1", "k2"], everywhere, 100),
        RangeQuery::new(2, ["k1", "k2"], Rectangle::new(0.0, 0.0, 8.0, 10.0), 100),
        RangeQuery::new(3, ["k1", "k2"], everywhere, 100),
        RangeQuery::new(4, ["k3", "k6"], everywhere, 100),
        RangeQuery::new(5, ["k1", "k3"], everywhere, 100),
        RangeQuery::new(6, vec!["k1", "k2", "k3"], everywhere, 100),
        RangeQuery::new(7, vec!["k2", "k3", "k7"], everywhere, 100),
        RangeQuery::new(8, vec!["k2"], everywhere, 100),
        RangeQuery::new(9, ["k1", "k3"], Rectangle::new(6.0, 7.0, 10.0, 10.0), 100),
        RangeQuery::new(10, ["k1", "k3"], Rectangle::new(0.0, 0.0, 4.0, 4.0), 100),
        RangeQuery::new(11, ["k1", "k3"], Rectangle::new(6.0, 0.0, 10.0, 4.0), 100),
    ];

    println!("=== Registering queries ===");
    report.time_creation(|| -> Result<()> {
        for query in range_queries {
            index.register_query(query)?;
        }
        index.register_query(KnnQuery::new(12, ["k1", "k2"], Point::new(5.0, 5.0), 3, 100))?;
        index.register_query(KnnQuery::new(14, ["k1", "k2"], Point::new(7.0, 7.0), 2, 100))?;
        Ok(())
    })?;
    println!("  {} cells live", index.cell_count());

    println!("\n=== Searching objects ===");
    let objects = [(7.0, 8.0), (5.0, 5.0), (2.0, 6.0), (1.0, 1.0), (5.0, 6.0)];
    for (i, (x, y)) in objects.into_iter().enumerate() {
        let object = DataObject::new(i as u64 + 1, ["k1", "k2"], Point::new(x, y)).at(i as u64 + 1);
        let hits = report.time_search(|| index.search_object(&object));
        let mut ids: Vec<u64> = hits.iter().map(|q| q.id()).collect();
        ids.sort_unstable();
        println!("  object {} at ({}, {}) -> {:?}", object.id(), x, y, ids);
    }

    println!("\n=== Index layout ===");
    print!("{}", index.dump_index());

    println!("\n=== Keyword frequencies ===");
    for (keyword, frequency) in index.keyword_frequencies() {
        println!(
            "  {:<4} registered {:>2}, visited {:>2}",
            keyword, frequency.registration_count, frequency.visit_count
        );
    }

    let stats = index.stats();
    println!("\n=== Stats ===");
    println!("  {}", serde_json::to_string_pretty(&stats)?);

    let report = report
        .with_extra("queries", stats.registrations)
        .with_extra("scanned_per_search", format!("{:.2}", stats.scanned_per_search()));
    match std::env::args().nth(1) {
        Some(path) => {
            report.append_to(&path)?;
            println!("\nReport appended to {}", path);
        }
        None => println!("\nReport: {}", report.record().join(",")),
    }

    Ok(())
}
