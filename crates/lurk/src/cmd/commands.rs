use lurk_session::CommandTable;

use crate::cmd::CommandsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_commands, OutputFormat};

pub fn run(_args: CommandsArgs, format: OutputFormat) -> CliResult<i32> {
    print_commands(&CommandTable::with_builtins(), format);
    Ok(SUCCESS)
}
