use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use stochastic_mlp::{Activation, Dataset, NetworkBuilder, TrainConfig};

struct CountingAlloc {
    allocs: AtomicUsize,
    reallocs: AtomicUsize,
}

impl CountingAlloc {
    const fn new() -> Self {
        Self {
            allocs: AtomicUsize::new(0),
            reallocs: AtomicUsize::new(0),
        }
    }

    fn reset(&self) {
        self.allocs.store(0, Ordering::Relaxed);
        self.reallocs.store(0, Ordering::Relaxed);
    }

    fn alloc_events(&self) -> usize {
        self.allocs.load(Ordering::Relaxed) + self.reallocs.load(Ordering::Relaxed)
    }
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        self.reallocs.fetch_add(1, Ordering::Relaxed);
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc::new();

fn make_dataset(len: usize, input_dim: usize, num_classes: usize) -> Dataset {
    let inputs = vec![0.1_f64; len * input_dim];
    let labels = (0..len).map(|i| i % num_classes).collect();
    Dataset::from_flat(inputs, labels, input_dim).unwrap()
}

#[test]
fn train_does_not_allocate_per_step() {
    let input_dim = 32;
    let hidden = 16;
    let classes = 8;

    let base = NetworkBuilder::new(input_dim)
        .unwrap()
        .add_layer(hidden)
        .unwrap()
        .add_layer(classes)
        .unwrap()
        .activation(Activation::Sigmoid)
        .build_with_seed(0)
        .unwrap();

    let train_small = make_dataset(8, input_dim, classes);
    let train_large = make_dataset(8 * 64, input_dim, classes);

    let cfg = TrainConfig {
        learning_rate: 0.1,
        epochs: 2,
    };

    let mut net_small = base.clone();
    ALLOC.reset();
    net_small.train(&train_small, cfg).unwrap();
    let alloc_small = ALLOC.alloc_events();

    let mut net_large = base;
    ALLOC.reset();
    net_large.train(&train_large, cfg).unwrap();
    let alloc_large = ALLOC.alloc_events();

    assert_eq!(
        alloc_small, alloc_large,
        "allocation events grew with the number of steps"
    );
}
