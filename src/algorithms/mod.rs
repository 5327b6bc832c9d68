pub mod cache;
pub mod grid;
pub mod interpolate;
pub mod maskers;
pub mod masking;
pub mod ranks;
pub mod rise;

pub use cache::{MaskCache, MaskKey};
pub use grid::{determine_number_masked, sample_channel_grid, sample_grid, sample_uniform_grid};
pub use interpolate::{
    interpolate_shifted, project_grid, project_grids_to_masks, project_grids_with_offsets,
    upscale_bilinear,
};
pub use maskers::{
    generate_channel_masks, generate_interpolated_float_masks,
    generate_interpolated_float_masks_for_timeseries, generate_masks, generate_time_step_masks,
    MaskStrategy,
};
pub use masking::mask_data;
pub use ranks::RankTable;
pub use rise::{aggregate, Perturbation, RiseExplainer};
