use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let names = ["Coffee", "Tea", "Juice", "Water", "Soda", "Smoothie"];
    let regions = ["North", "South", "East", "West"];
    // Busier in the morning and afternoon.
    let hours = [7, 8, 9, 10, 12, 13, 15, 16, 19, 21, 2];

    let start = Utc
        .with_ymd_and_hms(2022, 1, 3, 0, 0, 0)
        .single()
        .context("invalid start date")?;
    let days = 3 * 365;

    let mut records: Vec<Value> = Vec::new();
    for day in 0..days {
        // Slow upward trend plus a yearly wave.
        let trend = 1.0 + day as f64 / days as f64;
        let season = 1.0 + 0.3 * (day as f64 / 365.0 * 2.0 * std::f64::consts::PI).sin();
        let per_day = 2 + rng.below(6);

        for _ in 0..per_day {
            let hour = hours[rng.below(hours.len())];
            let minute = rng.below(60) as i64;
            let t = start + Duration::days(day) + Duration::hours(hour) + Duration::minutes(minute);
            let value = (rng.gauss(20.0, 6.0) * trend * season).max(0.0).round();

            records.push(json!({
                "t": t.to_rfc3339(),
                "value": value,
                "name": names[rng.below(names.len())],
                "region": regions[rng.below(regions.len())],
            }));
        }
    }

    let output_path = "sample_data.json";
    let file = File::create(output_path).with_context(|| format!("creating {output_path}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &records)
        .with_context(|| format!("writing {output_path}"))?;

    println!("Wrote {} records over {days} days to {output_path}", records.len());
    Ok(())
}
