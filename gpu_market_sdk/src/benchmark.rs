use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::errors::Error;
use crate::types::BenchmarkHash;

pub const MODELS: [&str; 9] = [
    "NVIDIA A100",
    "NVIDIA 4080",
    "NVIDIA 4080 TI",
    "NVIDIA H100",
    "NVIDIA 5090",
    "NVIDIA 2080 TI",
    "NVIDIA 2080",
    "AMD RX9000",
    "AMD 7800XT",
];

/// Exclusive upper bound of generated GPU uuid suffixes.
const UUID_SPACE: u32 = 100_000;

/// Fabricated hardware metrics. Field order is part of the commitment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub model: String,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub avg_fps: f64,
    pub max_fps: f64,
    pub mem_bw: f64,
}

impl Benchmark {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let avg_temp: f64 = rng.gen_range(0.0..100.0);
        let max_temp = avg_temp + rng.gen_range(0.0..100.0);
        let avg_fps: f64 = rng.gen_range(0.0..100.0);
        let max_fps = avg_fps + rng.gen_range(0.0..100.0);
        let mem_bw: f64 = rng.gen_range(0.0..1000.0);
        let model = MODELS[rng.gen_range(0..MODELS.len())].to_string();
        Self {
            model,
            avg_temp,
            max_temp,
            avg_fps,
            max_fps,
            mem_bw,
        }
    }

    /// keccak-256 over the JSON encoding. Only this hash goes on-chain.
    pub fn commitment(&self) -> Result<BenchmarkHash, Error> {
        let json = serde_json::to_string(self)?;
        let digest = Keccak256::digest(json.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Ok(BenchmarkHash(out))
    }
}

pub fn generate_uuid<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("GPU-{}", rng.gen_range(0..UUID_SPACE))
}

/// A finished benchmark run, ready to register.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkRun {
    pub uuid: String,
    pub benchmark: Benchmark,
}

impl BenchmarkRun {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            benchmark: Benchmark::generate(rng),
            uuid: generate_uuid(rng),
        }
    }
}

/// Simulates the benchmark taking `delay` before producing results.
pub async fn run_benchmark(delay: Duration) -> BenchmarkRun {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    BenchmarkRun::generate(&mut rand::thread_rng())
}

/// Raw benchmarks keyed by their commitment. Display only.
#[derive(Clone, Debug, Default)]
pub struct BenchmarkBook {
    entries: HashMap<BenchmarkHash, Benchmark>,
}

impl BenchmarkBook {
    pub fn insert(&mut self, hash: BenchmarkHash, benchmark: Benchmark) {
        self.entries.insert(hash, benchmark);
    }

    pub fn get(&self, hash: &BenchmarkHash) -> Option<&Benchmark> {
        self.entries.get(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
