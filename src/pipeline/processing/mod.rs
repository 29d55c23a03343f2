// Pipeline processing: normalization and validation of merged batches

pub mod normalize;
pub mod quality_gate;
