//! The simulated host identity.
//!
//! Every attacker-visible string lives here: the banner, the prompt,
//! and the canned outputs the local resolver serves. Keeping them in
//! one module makes the deception surface auditable — nothing outside
//! this module invents host details, so the persona stays consistent
//! across the banner, local handlers, and the generative responder.

/// Hostname the decoy presents everywhere (prompt, uname, /etc/hostname).
pub const HOSTNAME: &str = "server-dev-01";

/// Unix account the attacker appears to be logged in as.
pub const USERNAME: &str = "user";

/// Version banner sent as the first line of every connection.
///
/// Cosmetic only — the service speaks a line-oriented text protocol,
/// not the SSH wire protocol.
pub const BANNER: &str = "SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.5\n";

/// Canned `uname` output for the simulated Debian host.
pub const UNAME_OUTPUT: &str =
    "Linux server-dev-01 4.19.0-21-amd64 #1 SMP Debian 9 x86_64 GNU/Linux\n";

/// Canned `id` output.
pub const ID_OUTPUT: &str = "uid=1000(user) gid=1000(user) groups=1000(user)\n";

/// Canned `whoami` output.
pub const WHOAMI_OUTPUT: &str = "user\n";

/// Listing served for `ls` on the root directory.
pub const ROOT_LISTING: &str =
    "bin\nboot\ndev\netc\nhome\nlib\nproc\nroot\nrun\nsbin\ntmp\nusr\nvar\n";

/// Listing served for `ls` on a `home` directory.
pub const HOME_LISTING: &str = "user\n";

/// Listing served for `ls` anywhere else.
pub const GENERIC_LISTING: &str = "file.txt\n";

/// Contents of the simulated `/etc/passwd`.
pub const PASSWD_CONTENTS: &str =
    "root:x:0:0:root:/root:/bin/bash\nuser:x:1000:1000:User,,,:/home/user:/bin/bash\n";

/// Contents of the simulated `/etc/hostname`.
pub const HOSTNAME_CONTENTS: &str = "server-dev-01\n";

/// Output for the literal `help` command.
pub const HELP_TEXT: &str =
    "Supported (simulated) commands: cd, pwd, ls, whoami, id, uname, cat, echo\n";

/// Persona instruction for the generative responder.
///
/// `{current_dir}` is substituted with the live working directory via
/// [`system_prompt`]. The template instructs the backend to emit only
/// the literal command output and to never break character.
pub const SYSTEM_PROMPT_TEMPLATE: &str = "You are a simulated minimal Debian server 'server-dev-01'.\n\
     Respond only with the exact output of the requested shell command followed by a newline.\n\
     If a command is unknown, return \"bash: [command]: command not found\\n\".\n\
     Never break character or mention that you are simulated.\n\
     Current directory: {current_dir}\n";

/// Render the shell prompt for a working directory.
///
/// Format: `user@<hostname>:<workingDirectory>$ ` — sent after the
/// banner and after every processed command.
#[must_use]
pub fn prompt(working_directory: &str) -> String {
    format!("{USERNAME}@{HOSTNAME}:{working_directory}$ ")
}

/// Render the responder persona with the live working directory.
#[must_use]
pub fn system_prompt(working_directory: &str) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{current_dir}", working_directory)
}
