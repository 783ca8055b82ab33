//! `rastertile value-count`: count the values of one raster.

use std::path::PathBuf;

use rastertile::service::TileService;

use super::common::{open_and_build, print_count, CountArgs};
use crate::error::CliError;

pub async fn run(service: &TileService, raster: PathBuf, args: CountArgs) -> Result<(), CliError> {
    let layers = open_and_build(service, &[("x".to_string(), raster)], args.kind).await?;
    print_count(service, layers, None, &args).await
}
