/*
 * Copyright 2019-2020 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use tensor_store::tensor::Array;
use tensor_store::{Dataset, DatasetOptions, Htype, TensorOptions};

/// Return a buffer containing `size` random bytes for testing purposes.
fn random_bytes(size: usize) -> Vec<u8> {
    let mut rng = SmallRng::from_entropy();
    let mut buffer = vec![0u8; size];
    rng.fill_bytes(&mut buffer);
    buffer
}

/// A fresh in-memory dataset with a single `uint8` tensor of the given
/// per-sample byte size.
fn new_dataset() -> Dataset {
    let mut ds = Dataset::open_memory(DatasetOptions::new()).unwrap();
    ds.create_tensor("bench", Htype::Generic, TensorOptions::new().dtype("uint8"))
        .unwrap();
    ds
}

pub fn append_sample(criterion: &mut Criterion) {
    let _ = env_logger::builder().is_test(false).try_init();

    let mut group = criterion.benchmark_group("Append a sample");

    for sample_size in [4 * 1024, 64 * 1024, 1024 * 1024].iter() {
        group.throughput(Throughput::Bytes(*sample_size as u64));
        group.bench_function(format!("{} bytes", sample_size), |bencher| {
            bencher.iter_batched(
                || (new_dataset(), random_bytes(*sample_size)),
                |(mut ds, bytes)| {
                    ds.tensor_mut("bench")
                        .unwrap()
                        .append(Array::new("uint8", vec![*sample_size], bytes))
                        .unwrap();
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

pub fn read_sample(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("Read a sample");

    for sample_size in [4 * 1024, 64 * 1024, 1024 * 1024].iter() {
        let mut ds = new_dataset();
        ds.tensor_mut("bench")
            .unwrap()
            .append(Array::new("uint8", vec![*sample_size], random_bytes(*sample_size)))
            .unwrap();

        group.throughput(Throughput::Bytes(*sample_size as u64));
        group.bench_function(format!("{} bytes", sample_size), |bencher| {
            bencher.iter(|| ds.tensor("bench").unwrap().numpy(false).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, append_sample, read_sample);
criterion_main!(benches);
