use research_stream::observability::init_observability;
use research_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    init_observability("info");
    let client = ResearchClient::from_config(ClientConfig::from_env()?)?;

    let mut run = client
        .submit(ResearchRequest::manual(
            "monday.com",
            split_list("Maya Asher"),
        ))
        .await?;

    let mut printed = 0;
    while let Some(state) = run.next_state().await {
        for message in state.progress_log.iter().skip(printed) {
            println!("[{}] {message}", state.status_category);
        }
        printed = state.progress_log.len();
        match state.phase {
            Phase::SettledOk => match &state.final_result {
                Some(result) => println!("{result}"),
                None => eprintln!("stream ended without a final result"),
            },
            Phase::SettledError => {
                eprintln!("{}", state.error_message.unwrap_or_default());
            }
            Phase::Idle | Phase::Active => {}
        }
    }

    let _ = run.finish().await?;
    Ok(())
}
