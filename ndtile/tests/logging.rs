use ndarray::Array2;
use ndtile::BlockIndexer;
use ndtile::NDTILE_LOG;
use ndtile::initialize_logging;

#[test]
fn test_initialize_logging() {
    std::env::set_var(NDTILE_LOG, "ndtile=debug");
    initialize_logging();
    // A second call finds the subscriber already installed.
    initialize_logging();

    let data = Array2::<u8>::zeros((40, 32));
    let indexer = BlockIndexer::new(&data, [16, 16], 0).unwrap();
    assert_eq!(indexer.num_blocks(), vec![2, 2]);
}
