//! Interactive conversation loop.

use std::io::{self, BufRead};
use std::path::Path;

use anyhow::Result;

use crate::display;
use crate::orchestrator::Session;

/// Run the conversation until the customer leaves or stdin closes. Writes
/// the transcript to `export` on the way out, when requested.
pub async fn run(
    session: &mut Session,
    export: Option<&Path>,
    show_extraction: bool,
) -> Result<()> {
    display::print_welcome(&session.catalog().restaurant);

    let greeting = session.greet().await;
    display::print_waiter(&greeting.reply);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        display::print_prompt();

        let input = match lines.next() {
            Some(Ok(line)) => line.trim().to_string(),
            Some(Err(e)) => {
                eprintln!("Errore di lettura: {e}");
                continue;
            }
            None => break, // EOF
        };

        if input.is_empty() {
            continue;
        }

        let result = session.handle_turn(&input).await;

        if show_extraction {
            display::print_extraction(&result.extraction);
        }
        display::print_waiter(&result.reply);

        if result.quit {
            break;
        }
    }

    if let Some(path) = export {
        std::fs::write(path, session.export_history_json()?)?;
        println!("Trascrizione salvata in {}", path.display());
    }

    Ok(())
}
