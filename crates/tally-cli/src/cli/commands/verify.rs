use anyhow::{Context, Result};
use tally_sync::{verify_manifest, RsaManifestVerifier};

use crate::cli::args::VerifyArgs;
use crate::exit_codes::SUCCESS;

pub fn cmd_verify(args: VerifyArgs) -> Result<i32> {
    let verifier = RsaManifestVerifier::from_pem_file(&args.key)?;
    let verified = verify_manifest(&args.archive, &verifier)
        .with_context(|| format!("manifest {} failed verification", args.archive.display()))?;

    println!("{}", verified.digest);
    for entry in &verified.entries {
        println!("  {entry}");
    }
    eprintln!(
        "Manifest verified ({}): OK, {} entries",
        args.archive.display(),
        verified.entries.len()
    );
    Ok(SUCCESS)
}
