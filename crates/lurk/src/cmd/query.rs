use crate::cmd::QueryArgs;
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_game_info, OutputFormat};

pub fn run(args: QueryArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = args.server.connect()?;
    let info = session
        .setup()
        .map_err(|err| session_error("query failed", err))?;
    session.close();
    tracing::debug!(peer = session.peer(), "query complete");

    print_game_info(&info, format);
    Ok(SUCCESS)
}
