use hdt_core::{load_dir, swagger};

use crate::exit_codes;
use crate::CommonArgs;

pub fn gendoc_cmd(args: &CommonArgs) -> i32 {
    let project = match load_dir(&args.indir) {
        Ok(project) => project,
        Err(e) => {
            for error in &e.errors {
                tracing::error!("{error}");
            }
            return exit_codes::GENDOC_FAILED;
        }
    };

    let outdir = args.outdir.as_ref().unwrap_or(&args.indir);
    if let Err(e) = std::fs::create_dir_all(outdir) {
        tracing::error!("{}: {e}", outdir.display());
        return exit_codes::GENDOC_FAILED;
    }

    for vhost in &project.vhosts {
        let doc = match swagger::emit_vhost(vhost, &project.descriptors, &project.catalog) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("{e}");
                return exit_codes::GENDOC_FAILED;
            }
        };
        let path = outdir.join(format!("swagger-{}.json", vhost.name));
        let pretty = match serde_json::to_string_pretty(&doc) {
            Ok(pretty) => pretty,
            Err(e) => {
                tracing::error!("{e}");
                return exit_codes::GENDOC_FAILED;
            }
        };
        if let Err(e) = std::fs::write(&path, pretty) {
            tracing::error!("{}: {e}", path.display());
            return exit_codes::GENDOC_FAILED;
        }
        tracing::info!("wrote {}", path.display());
    }

    exit_codes::SUCCESS
}
