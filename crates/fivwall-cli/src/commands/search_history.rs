use crate::cli::SearchHistoryCommands;
use crate::commands::common::{load_local_state, normalize_search_query, open_synced_session};
use crate::error::CliError;
use crate::session::ResolvedProfile;

pub async fn run_search_history(
    command: Option<SearchHistoryCommands>,
    resolved: &ResolvedProfile,
) -> Result<(), CliError> {
    match command {
        None => {
            let file = load_local_state(resolved)?;
            if file.state.recent_searches.is_empty() {
                println!("No recent searches.");
            }
            for query in &file.state.recent_searches {
                println!("{query}");
            }
            Ok(())
        }
        Some(SearchHistoryCommands::Add { query }) => {
            let query = normalize_search_query(&query.join(" "))?;
            let session = open_synced_session(resolved).await?;
            session.store().add_recent_search(&query);
            session.finish().await?;
            Ok(())
        }
        Some(SearchHistoryCommands::Clear) => {
            let session = open_synced_session(resolved).await?;
            session.store().clear_recent_searches();
            session.finish().await?;
            println!("Recent searches cleared");
            Ok(())
        }
    }
}
