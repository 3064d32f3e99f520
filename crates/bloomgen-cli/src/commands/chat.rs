//! Chat command handler

use crate::error::CliError;
use bloomgen::prelude::*;
use bloomgen::session::EXIT_COMMAND;
use rustyline::DefaultEditor;

pub async fn run_chat(app: BloomgenApp) -> Result<(), CliError> {
    println!("🤖 bloomgen chat - Type '{}' to quit", EXIT_COMMAND);
    println!("================================");

    let mut session = Session::new(app);
    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("📝 > ");
        match readline {
            Ok(line) => {
                rl.add_history_entry(&line).ok();

                let request = match session.submit(&line) {
                    Submission::Exit => {
                        println!("¡Adiós! 👋");
                        break;
                    }
                    Submission::Generate(request) => request,
                    Submission::Ignored => continue,
                };

                // Ctrl-C while sampling stops the request, not the process.
                let cancel = request.cancel.clone();
                let app = session.app().clone();
                let pending = app.submit(request);
                tokio::pin!(pending);
                let result = tokio::select! {
                    result = &mut pending => result,
                    _ = tokio::signal::ctrl_c() => {
                        println!("\n⏹️  Cancelling...");
                        cancel.cancel();
                        pending.await
                    }
                };

                session.complete(result);
                print!("{}", session.output());
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("\nCtrl-C received. Use '{}' to quit.", EXIT_COMMAND);
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("\n¡Adiós! 👋");
                break;
            }
            Err(err) => {
                return Err(err.into());
            }
        }
    }

    Ok(())
}
