mod input;
mod run_extract;
mod run_fit;
mod run_transform;
mod run_validate;
mod vetch_common;

use run_extract::*;
use run_fit::*;
use run_transform::*;
use run_validate::*;
use vetch_common::info;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "VETCH",
    long_about = "Visual Expression alignment of Tissue Coordinates and Histology\n\
		  Aligns gene-expression and image-derived spot modalities in a\n\
		  shared latent space, translates between them, and validates\n\
		  the geometry of the extraction + transform pipeline."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Extract per-spot feature vectors from an image",
        long_about = "Cut a pixel window around each spot coordinate under a\n\
		      given spot size, rotation and displacement, and pool the\n\
		      window into one feature vector per spot.\n"
    )]
    Extract(ExtractArgs),

    #[command(
        about = "Fit the joint factorization across modalities",
        long_about = "Row-align the gene-expression and spot-feature matrices,\n\
		      then fit the linked low-rank model by alternating ridge\n\
		      least squares under the declared join topology.\n"
    )]
    Fit(FitArgs),

    #[command(
        about = "Translate observations from one modality into another",
        long_about = "Project new source-modality observations into the shared\n\
		      latent space and reconstruct the prediction in the target\n\
		      modality's feature space.\n"
    )]
    Transform(TransformArgs),

    #[command(
        about = "Run the geometric validation protocols",
        long_about = "Rotation invariance, displacement sensitivity, off-axis\n\
		      similarity and per-feature smoothness of the cross-modal\n\
		      predictions, written as one report per protocol.\n"
    )]
    Validate(ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Extract(args) => {
            run_extract(args)?;
        }
        Commands::Fit(args) => {
            run_fit(args)?;
        }
        Commands::Transform(args) => {
            run_transform(args)?;
        }
        Commands::Validate(args) => {
            run_validate(args)?;
        }
    }

    info!("Done");
    Ok(())
}
