//! Show command - displays information.

use anyhow::Result;

use crate::config::Config;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the resolved paths of one version
    Paths { version: String },
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Paths { version } => {
            let paths = config.resolve(&version)?;
            println!("Paths for {}:", paths.version);
            println!("  source image:        {}", paths.source_image.display());
            println!("  descriptor template: {}", paths.descriptor_template.display());
            println!("  engine config:       {}", paths.engine_config.display());
            println!("  synthesized image:   {}", paths.image_path.display());
            println!("  output directory:    {}", paths.output_dir.display());
            println!("  artifact name:       {}", paths.artifact_name);
            println!("  box:                 {}", paths.box_path.display());
            println!("  lease:               {}", paths.lease_path.display());
            println!("  engine log:          {}", paths.engine_log.display());
        }
    }
    Ok(())
}
