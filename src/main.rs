use std::io::Write;

use anyhow::Context;
use log::info;
use structopt::StructOpt;
use tokio::sync::mpsc;

use mxrom::image::{image_digest, Geometry};
use mxrom::programmer::{QueueEvent, TokioLauncher};
use mxrom::session::{default_dump_dir, timestamped_dump_name, Session, Settings};

mod cli;

use cli::{FragmentArg, LayoutOpts, SaveOpts, WriteSlotOpts};

/// Prints process output on stdout and keeps a progress indicator on stderr
async fn print_events(mut events: mpsc::UnboundedReceiver<QueueEvent>) {
    let stderr = std::io::stderr();

    while let Some(event) = events.recv().await {
        match event {
            QueueEvent::Line(line) => println!("{}", line),
            QueueEvent::Output(data) => {
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(data.as_bytes());
                let _ = stdout.flush();
            }
            QueueEvent::Progress(percent) if percent > 0 => {
                let mut stderr = stderr.lock();
                let _ = write!(stderr, "\r{:3}%", percent);

                if percent == 100 {
                    let _ = writeln!(stderr);
                }

                let _ = stderr.flush();
            }
            _ => {}
        }
    }
}

/// Loads every fragment into its bank, in the order given
fn load_fragments(session: &mut Session, fragments: &[FragmentArg]) -> Result<(), anyhow::Error> {
    for fragment in fragments {
        let added = session
            .add_files(fragment.bank, &[&fragment.path])
            .with_context(|| format!("Failed to load '{}'", fragment.path.display()))?;

        if added == 0 {
            anyhow::bail!(
                "Could not add '{}' to slot {}",
                fragment.path.display(),
                fragment.bank
            );
        }
    }

    Ok(())
}

fn print_layout(session: &Session) {
    for bank in session.banks().banks() {
        println!(
            "Slot {}: {} of {} bytes used, {} free",
            bank.index(),
            bank.used_bytes(),
            bank.slot_size(),
            bank.free_bytes()
        );

        for fragment in bank.fragments() {
            println!("  {}", fragment);
        }

        println!("  sha256 {}", image_digest(&bank.build_image()));
    }

    println!(
        "Full image sha256 {}",
        image_digest(&session.banks().build_full_image())
    );
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    use cli::Command;

    // Create a logger with a timestamp that logs everything at Info level or above
    pretty_env_logger::init_timed();

    // Parse the command-line arguments
    let opts = cli::Opts::from_args();

    let settings = Settings {
        programmer: opts.programmer.clone(),
        device: opts.device.clone(),
        erase_first: !opts.no_erase,
        verify_after: !opts.no_verify,
    };

    let programmer = settings.programmer();

    info!(
        "Using programmer {} on device {}",
        programmer.program().display(),
        programmer.device_selection()
    );

    let (mut session, events) =
        Session::new(Geometry::default(), &settings, TokioLauncher, programmer);
    let printer = tokio::spawn(print_events(events));

    match &opts.command {
        Command::Info => session.identify(),
        Command::Erase => session.erase(),
        Command::Read { filename } => session.read_dump(filename),
        Command::Terminal => session.terminal(),
        Command::WriteSlot(WriteSlotOpts { bank, files }) => {
            let added = session.add_files(*bank, files.as_slice())?;

            if added == 0 {
                anyhow::bail!("No fragments could be added to slot {}", bank);
            }

            session
                .write_slot(*bank)
                .with_context(|| format!("Failed to prepare slot {}", bank))?;
        }
        Command::WriteAll(LayoutOpts { fragments }) => {
            load_fragments(&mut session, fragments)?;

            session
                .write_all()
                .with_context(|| "Failed to save the full image for programming")?;
        }
        Command::Save(SaveOpts { filename, layout }) => {
            load_fragments(&mut session, &layout.fragments)?;

            let path = filename
                .clone()
                .unwrap_or_else(|| default_dump_dir().join(timestamped_dump_name()));

            session.save_full_image(&path)?;
        }
        Command::Layout(LayoutOpts { fragments }) => {
            load_fragments(&mut session, fragments)?;
            print_layout(&session);
        }
    }

    let result = session.run_until_idle().await;

    // Closes the event channel so the printer can finish
    drop(session);
    let _ = printer.await;

    result?;

    Ok(())
}
