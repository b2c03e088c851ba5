use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use graphanim::config::Settings;
use graphanim::{Result, diagnostics, render, script};

#[derive(Parser)]
#[command(name = "graphanim")]
#[command(about = "Declarative graph animation core", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Html,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a script and write the frames it renders.
    Replay {
        #[arg(long)]
        script: String,

        /// Settings JSON; defaults apply when omitted.
        #[arg(long)]
        config: Option<String>,

        /// Output file; stdout when omitted.
        #[arg(short = 'o', long)]
        out: Option<String>,

        #[arg(long, value_enum, default_value = "json")]
        format: Format,

        /// Attach the force-layout view to every JSON frame.
        #[arg(long)]
        layout: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    diagnostics::init(cli.verbose);

    match cli.cmd {
        Commands::Replay {
            script: script_path,
            config,
            out,
            format,
            layout,
        } => {
            // 1) Settings and script (decoded + validated up front).
            let settings = match config {
                Some(path) => Settings::load(&path)?,
                None => Settings::default(),
            };
            let replay = script::Script::load(&script_path)?;

            // 2) Replay on the virtual clock.
            let recorder = script::run_script(&replay, settings);
            let errors = recorder.errors().count();

            // 3) Render.
            let text = match format {
                Format::Json => render::render_replay_json(&recorder, layout)?,
                Format::Html => render::render_replay_html(&recorder)?,
            };
            match out {
                Some(out) => {
                    std::fs::write(&out, text).with_context(|| {
                        diagnostics::error_message(format!("write output file {}", out))
                    })?;
                    println!("Wrote {} ({} frames, {} errors)", out, recorder.frames.len(), errors);
                }
                None => println!("{}", text),
            }
        }
    }

    Ok(())
}
