use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nxlazy::{
    array::{DataType, LazyArray, MemoryLoader, RealizedArray},
    iteration::SliceViewIterator,
    slice::{parse_slices, SliceND},
    storage::{store::MemoryStore, DatasetBuilder, StorageFile},
};

fn memory_array(size: u64) -> LazyArray {
    let data = RealizedArray::zeros(DataType::UInt16, vec![size; 3]);
    LazyArray::new("data", DataType::UInt16, vec![size; 3], Arc::new(MemoryLoader::new(data)))
}

fn slicing_strided(c: &mut Criterion) {
    let mut group = c.benchmark_group("slicing_strided");
    for size in [64u64, 128u64, 256u64].iter() {
        let array = memory_array(*size);
        let slice = SliceND::from_descriptors(array.shape(), &parse_slices("::-2,1::3,:").unwrap()).unwrap();
        group.throughput(Throughput::Bytes(slice.num_elements() * 2));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &_size| {
            b.iter(|| array.slice(&slice).unwrap());
        });
    }
    group.finish();
}

fn slicing_view_of_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("slicing_view_of_view");
    for size in [64u64, 128u64, 256u64].iter() {
        let array = memory_array(*size);
        let outer = SliceND::from_descriptors(array.shape(), &parse_slices("1:,::2,::-1").unwrap()).unwrap();
        let view = array.slice_view(&outer).unwrap();
        let inner = SliceND::from_descriptors(view.shape(), &parse_slices("::3,:,1:-1").unwrap()).unwrap();
        group.throughput(Throughput::Bytes(inner.num_elements() * 2));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &_size| {
            b.iter(|| view.slice_view(&inner).unwrap().realize().unwrap());
        });
    }
    group.finish();
}

fn slicing_chunked_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("slicing_chunked_frames");
    for size in [64u64, 128u64].iter() {
        let store = Arc::new(MemoryStore::new());
        let mut file = StorageFile::create(store, "bench.nxs").unwrap();
        let mut builder = DatasetBuilder::new(vec![*size; 3], DataType::UInt16);
        builder.chunk_shape(vec![8, *size, *size]);
        let mut data = file.create_data("/", "data", &builder).unwrap();
        let frame = RealizedArray::from_elements(vec![1, *size, *size], &vec![1u16; (size * size) as usize]).unwrap();
        for i in 0..*size {
            data.set_slice_at(&[i, 0, 0], &frame).unwrap();
        }
        let array = file.get_data("/data").unwrap();
        group.throughput(Throughput::Bytes(size * size * size * 2));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &_size| {
            b.iter(|| {
                SliceViewIterator::new(array.clone(), &[], &[1, 2])
                    .unwrap()
                    .map(|view| view.unwrap().realize().unwrap())
                    .count()
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    slicing_strided,
    slicing_view_of_view,
    slicing_chunked_frames
);
criterion_main!(benches);
