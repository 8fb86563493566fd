// IDE Agent Gateway - Prompts
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// System prompt and first user turn for an agent run.

use crate::session::SessionContext;
use std::path::Path;

pub const SUMMARY_REQUEST: &str =
    "Please provide a summary of what has been accomplished and any remaining tasks.";

const SYSTEM_TEMPLATE: &str = r#"<IDENTITY>
You are a coding agent working inside a generated application's codebase.
You fix build errors, modify existing features and add new ones.
Every change you make must leave the project building and running.
</IDENTITY>

<PROJECT_CONTEXT>
<GLOBAL_SCRATCH_PAD>
{global_scratch_pad}
</GLOBAL_SCRATCH_PAD>

<SCREEN_SCRATCH_PADS>
{screen_scratch_pads}
</SCREEN_SCRATCH_PADS>
</PROJECT_CONTEXT>

<TOOL_USE>
1. Use tools without asking permission and follow their schemas exactly.
2. Make ONE tool call at a time and base the next step on its actual output.
3. Read a file (or the relevant section) before editing it, unless creating a new file.
4. Combine all changes to one file into a single edit_file call.
5. If a tool fails, fix the parameters and retry.
6. Commands run in the codebase directory; destructive commands are refused.
7. Your last tool call must ALWAYS be exit_tool with a summary of what was done,
   what is still broken, and the key decisions you made.
</TOOL_USE>

<DEBUGGING>
Find the root cause from the error output before changing code.
Do not loop on the same failing fix; step back and reason about each result.
</DEBUGGING>
"#;

const USER_TEMPLATE: &str = r#"<USER_QUERY>
{user_query}
</USER_QUERY>

<FILE_STRUCTURE>
{file_structure}
</FILE_STRUCTURE>

<CONTEXT_PATHS>
Codebase Location: {codebase_path}
</CONTEXT_PATHS>
"#;

pub fn system_prompt(ctx: &SessionContext) -> String {
    SYSTEM_TEMPLATE
        .replace("{global_scratch_pad}", &ctx.global_scratchpad)
        .replace("{screen_scratch_pads}", &ctx.screen_scratchpads)
}

pub fn user_prompt(query: &str, codebase: &Path, ctx: &SessionContext) -> String {
    // codebase first: the query is user text and may contain braces
    USER_TEMPLATE
        .replace("{codebase_path}", &codebase.display().to_string())
        .replace("{file_structure}", &ctx.file_structure)
        .replace("{user_query}", query)
}

// ============================================================================
// TESTS
// ============================================================================
