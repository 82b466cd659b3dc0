use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Prefer a system protoc when one is configured
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    println!("cargo:rerun-if-changed=proto/booking.proto");

    tonic_build::configure().compile(
        &["proto/booking.proto"],
        &[PathBuf::from("proto/"), protoc_bin_vendored::include_path()?],
    )?;
    Ok(())
}
