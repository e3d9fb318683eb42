use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

/// Write a synthetic clumpy galaxy (positions, velocities, sky coordinates) to CSV
#[derive(Parser)]
#[command(name = "generate_sample")]
struct Args {
    /// Output CSV file
    #[arg(short, long, default_value = "galaxy_sample.csv")]
    output: PathBuf,

    /// Number of clumps embedded in the halo
    #[arg(long, default_value = "6")]
    clumps: usize,

    /// Stars per clump
    #[arg(long, default_value = "400")]
    per_clump: usize,

    /// Background halo stars
    #[arg(long, default_value = "1500")]
    halo: usize,

    #[arg(long, default_value = "42")]
    seed: u64,
}

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

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One star: position (kpc) and velocity (km/s).
struct Star {
    pos: [f64; 3],
    vel: [f64; 3],
}

impl Star {
    /// Galactic-style longitude / latitude in degrees, seen from the origin.
    fn sky(&self) -> (f64, f64) {
        let [x, y, z] = self.pos;
        let r = (x * x + y * y + z * z).sqrt();
        let l = y.atan2(x).to_degrees();
        let b = if r > 0.0 { (z / r).asin().to_degrees() } else { 0.0 };
        (l, b)
    }
}

/// A clump: compact in position, with its own bulk velocity. Every other
/// clump is split into two streams that share the position but not the
/// velocity, so position and velocity clusterings disagree.
fn clump(rng: &mut SimpleRng, index: usize, size: usize) -> Vec<Star> {
    let centre = [rng.gauss(0.0, 8.0), rng.gauss(0.0, 8.0), rng.gauss(0.0, 2.0)];
    let spread = rng.uniform(0.3, 0.8);
    let bulk = [rng.gauss(0.0, 120.0), rng.gauss(0.0, 120.0), rng.gauss(0.0, 40.0)];
    let split = index % 2 == 1;

    (0..size)
        .map(|i| {
            let offset = if split && i % 2 == 0 { 80.0 } else { 0.0 };
            Star {
                pos: [
                    rng.gauss(centre[0], spread),
                    rng.gauss(centre[1], spread),
                    rng.gauss(centre[2], spread),
                ],
                vel: [
                    rng.gauss(bulk[0] + offset, 10.0),
                    rng.gauss(bulk[1], 10.0),
                    rng.gauss(bulk[2], 10.0),
                ],
            }
        })
        .collect()
}

fn halo(rng: &mut SimpleRng, size: usize) -> Vec<Star> {
    (0..size)
        .map(|_| Star {
            pos: [rng.gauss(0.0, 15.0), rng.gauss(0.0, 15.0), rng.gauss(0.0, 6.0)],
            vel: [rng.gauss(0.0, 150.0), rng.gauss(0.0, 150.0), rng.gauss(0.0, 100.0)],
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    let mut stars = halo(&mut rng, args.halo);
    for i in 0..args.clumps {
        stars.extend(clump(&mut rng, i, args.per_clump));
    }

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    writer.write_record(["x", "y", "z", "vx", "vy", "vz", "l", "b"])?;
    for star in &stars {
        let (l, b) = star.sky();
        let record: Vec<String> = star
            .pos
            .iter()
            .chain(&star.vel)
            .chain([&l, &b])
            .map(|v| format!("{v:.5}"))
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;

    println!(
        "Wrote {} stars ({} clumps + {} halo) to {}",
        stars.len(),
        args.clumps,
        args.halo,
        args.output.display()
    );
    Ok(())
}
