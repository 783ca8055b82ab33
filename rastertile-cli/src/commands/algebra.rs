//! `rastertile algebra`: count the values of a formula over several rasters.

use std::path::PathBuf;

use rastertile::algebra::RasterAlgebra;
use rastertile::service::{ServiceError, TileService};

use super::common::{open_and_build, print_count, CountArgs};
use crate::error::CliError;

pub async fn run(
    service: &TileService,
    bindings: Vec<(String, PathBuf)>,
    formula: String,
    args: CountArgs,
) -> Result<(), CliError> {
    // Reject a bad formula before decoding any raster.
    let algebra = RasterAlgebra::parse(&formula).map_err(ServiceError::from)?;
    if let Some(missing) = algebra
        .variables()
        .into_iter()
        .find(|v| !bindings.iter().any(|(name, _)| name == v))
    {
        return Err(CliError::InvalidArgument(format!(
            "formula uses '{}' but no --layer {}=PATH was given",
            missing, missing
        )));
    }

    let layers = open_and_build(service, &bindings, args.kind).await?;
    print_count(service, layers, Some(&formula), &args).await
}
