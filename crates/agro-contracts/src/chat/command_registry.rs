#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is one raw argument.
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "module",
        action: "select_module",
    },
    CommandSpec {
        command: "m",
        action: "select_module",
    },
    CommandSpec {
        command: "unset",
        action: "unset_field",
    },
    CommandSpec {
        command: "result",
        action: "show_result",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "image",
    action: "set_image",
}];

pub(crate) const FIELD_COMMAND: CommandSpec = CommandSpec {
    command: "set",
    action: "set_field",
};

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "modules",
        action: "list_modules",
    },
    CommandSpec {
        command: "home",
        action: "home",
    },
    CommandSpec {
        command: "form",
        action: "show_form",
    },
    CommandSpec {
        command: "clear",
        action: "clear_form",
    },
    CommandSpec {
        command: "schema",
        action: "show_schema",
    },
    CommandSpec {
        command: "submit",
        action: "submit",
    },
    CommandSpec {
        command: "go",
        action: "submit",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "wait",
        action: "wait",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/modules",
    "/module <nombre>",
    "/home",
    "/set <campo> <valor>",
    "<campo>=<valor>",
    "/unset <campo>",
    "/image <ruta>",
    "/form",
    "/clear",
    "/schema",
    "/submit",
    "/status",
    "/wait",
    "/result [módulo] [json]",
    "/quit",
];
