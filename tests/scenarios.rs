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

use tensor_store::index::Selector;
use tensor_store::tensor::{Array, NumpyResult};
use tensor_store::{Dataset, DatasetOptions, Error, Htype, TensorOptions};

fn row_major_u8(shape: &[usize]) -> Vec<u8> {
    let total: usize = shape.iter().product();
    (0..total).map(|i| (i % 256) as u8).collect()
}

#[test]
fn slice_composition_over_a_single_write() {
    let mut ds = Dataset::open_memory(DatasetOptions::new()).unwrap();
    ds.create_tensor("data", Htype::Generic, TensorOptions::new().dtype("uint8"))
        .unwrap();

    let shape = vec![64, 16, 16, 16];
    let data = row_major_u8(&shape);
    ds.tensor_mut("data")
        .unwrap()
        .extend(Array::new("uint8", shape, data))
        .unwrap();

    // ds.data[30:40, :, 8:11, 4]
    let view = ds
        .tensor("data")
        .unwrap()
        .index_by(vec![
            Selector::Slice {
                start: 30,
                stop: 40,
                step: 1,
            },
            Selector::full(),
            Selector::Slice {
                start: 8,
                stop: 11,
                step: 1,
            },
            Selector::Integer(4),
        ])
        .unwrap();

    match view.numpy(false).unwrap() {
        NumpyResult::Stacked(array) => {
            assert_eq!(array.shape, vec![10, 16, 3]);
        }
        other => panic!("expected Stacked, got {:?}", other),
    }

    // ds.data[[0,1,2,5,6,10,60]]
    let list_view = ds
        .tensor("data")
        .unwrap()
        .index_by(vec![Selector::List(vec![0, 1, 2, 5, 6, 10, 60])])
        .unwrap();
    match list_view.numpy(false).unwrap() {
        NumpyResult::Stacked(array) => assert_eq!(array.shape, vec![7, 16, 16, 16]),
        other => panic!("expected Stacked, got {:?}", other),
    }

    // ds[(0,1,6,10,15), :].data
    let dataset_view = ds.view(vec![
        Selector::List(vec![0, 1, 6, 10, 15]),
        Selector::full(),
    ]);
    match dataset_view.tensor("data").unwrap().numpy(false).unwrap() {
        NumpyResult::Stacked(array) => assert_eq!(array.shape, vec![5, 16, 16, 16]),
        other => panic!("expected Stacked, got {:?}", other),
    }
}

#[test]
fn dtype_mismatch_leaves_tensor_empty() {
    let mut ds = Dataset::open_memory(DatasetOptions::new()).unwrap();
    ds.create_tensor("t", Htype::Generic, TensorOptions::new().dtype("uint8"))
        .unwrap();

    let result = ds
        .tensor_mut("t")
        .unwrap()
        .append(Array::new("float64", vec![100], vec![0u8; 800]));

    assert!(matches!(
        result,
        Err(Error::TensorMetaMismatch {
            field: "dtype",
            ..
        })
    ));
    assert_eq!(ds.tensor("t").unwrap().len(), 0);
}

#[test]
fn scalar_samples_mix_of_append_and_extend() {
    let mut ds = Dataset::open_memory(DatasetOptions::new()).unwrap();
    ds.create_tensor("t", Htype::Generic, TensorOptions::new().dtype("int64"))
        .unwrap();

    let to_bytes = |values: &[i64]| -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    };

    let tensor = ds.tensor_mut("t").unwrap();
    for value in [5i64, 10, -99] {
        tensor.append(Array::new("int64", vec![], value.to_le_bytes().to_vec())).unwrap();
    }
    tensor
        .extend(Array::new("int64", vec![3], to_bytes(&[10, 1, 4])))
        .unwrap();
    tensor
        .extend(Array::new("int64", vec![1], to_bytes(&[1])))
        .unwrap();

    assert_eq!(tensor.len(), 7);
    match tensor.numpy(false).unwrap() {
        NumpyResult::Stacked(array) => {
            let values: Vec<i64> = array
                .bytes
                .chunks_exact(8)
                .map(|chunk| i64::from_le_bytes(chunk.try_into().unwrap()))
                .collect();
            assert_eq!(values, vec![5, 10, -99, 10, 1, 4, 1]);
        }
        other => panic!("expected Stacked, got {:?}", other),
    }
}
