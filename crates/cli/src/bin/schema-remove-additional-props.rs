use color_eyre::eyre::Result;
use schema_sort_cli::Tool;

fn main() -> Result<()> {
    schema_sort_cli::main(Tool::RemoveAdditionalProps)
}
