use clap::CommandFactory;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Render emodel(1) and one page per subcommand into `out_dir`.
fn generate(out_dir: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    clap_mangen::generate_to(emodel::cli::Cli::command(), out_dir)?;

    let mut pages: Vec<PathBuf> = fs::read_dir(out_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "1"))
        .collect();
    pages.sort();
    Ok(pages)
}

fn main() -> io::Result<()> {
    let out_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    for page in generate(&out_dir)? {
        println!("Generated {}", page.display());
    }
    Ok(())
}
