// Writes focus.1 and one page per subcommand (focus-add.1, focus-remind.1, ...)

use clap::CommandFactory;
use clap_mangen::Man;
use focus_matrix::cli::Cli;
use std::path::PathBuf;

fn render(cmd: &clap::Command, path: &PathBuf) -> std::io::Result<()> {
    let mut buffer: Vec<u8> = Vec::new();
    Man::new(cmd.clone()).render(&mut buffer)?;
    std::fs::write(path, buffer)
}

fn main() -> std::io::Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    std::fs::create_dir_all(&out_dir)?;

    let cmd = Cli::command();
    render(&cmd, &out_dir.join("focus.1"))?;
    for sub in cmd.get_subcommands() {
        render(sub, &out_dir.join(format!("focus-{}.1", sub.get_name())))?;
    }
    println!("Man pages written to {}", out_dir.display());
    Ok(())
}
