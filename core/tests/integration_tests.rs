use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use flagtree_core::{
    Command, ConfigTree, ErrorHandling, FlagError, Scalar, TextValue, Value, ValueError, ValueKind, Var,
    alias, cfg, choices, env, one_cmd,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn app() -> Command {
    one_cmd("app", ErrorHandling::ContinueOnError)
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Endpoint {
    host: String,
    port: u16,
}

impl TextValue for Endpoint {
    fn unmarshal_text(&mut self, text: &str) -> Result<(), ValueError> {
        let (host, port) = text
            .rsplit_once(':')
            .ok_or_else(|| ValueError::invalid(format!("missing port in {text:?}")))?;
        self.host = host.to_string();
        self.port = port.parse().map_err(|_| ValueError::Range)?;
        Ok(())
    }

    fn marshal_text(&self) -> Result<String, ValueError> {
        if self.host.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{}:{}", self.host, self.port))
    }
}

/// Whole percentage, written with a trailing `%`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Percent(u8);

impl Scalar for Percent {
    const KIND: ValueKind = ValueKind::Custom;

    fn parse_text(text: &str) -> Result<Self, ValueError> {
        let digits = text.strip_suffix('%').ok_or(ValueError::Syntax)?;
        match digits.parse::<u8>() {
            Ok(n) if n <= 100 => Ok(Percent(n)),
            Ok(_) => Err(ValueError::Range),
            Err(_) => Err(ValueError::Syntax),
        }
    }

    fn render_text(&self) -> String {
        format!("{}%", self.0)
    }
}

/// Counts how often it is set; renders the count.
#[derive(Default)]
struct Counter(Cell<u32>);

impl Value for Counter {
    fn set(&self, _: &str) -> Result<(), ValueError> {
        self.0.set(self.0.get() + 1);
        Ok(())
    }

    fn render(&self) -> String {
        self.0.get().to_string()
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Custom
    }

    fn is_switch(&self) -> bool {
        true
    }

    fn zero_render(&self) -> Result<String, ValueError> {
        Ok("0".into())
    }
}

// ---------------------------------------------------------------------------
// Round trips through the registry
// ---------------------------------------------------------------------------

#[test]
fn test_defaults_round_trip_through_set() {
    let mut cmd = app();
    cmd.bool("b", true, "", []).unwrap();
    cmd.int("i", -7, "", []).unwrap();
    cmd.int64("i64", i64::MIN, "", []).unwrap();
    cmd.uint("u", 7, "", []).unwrap();
    cmd.uint64("u64", u64::MAX, "", []).unwrap();
    cmd.float64("f", 2718e28, "", []).unwrap();
    cmd.string("s", "hello", "", []).unwrap();
    cmd.duration("d", Duration::from_millis(1500), "", []).unwrap();

    let mut defaults = Vec::new();
    cmd.visit_all(|name, flag| defaults.push((name.to_string(), flag.default_value().to_string())));
    for (name, default) in &defaults {
        cmd.set(name, default).unwrap();
        assert_eq!(cmd.lookup(name).unwrap().current(), *default, "flag {name}");
    }
    assert_eq!(cmd.n_flag(), defaults.len());
}

#[test]
fn test_text_value_flag() {
    let mut cmd = app();
    let endpoint = cmd
        .text("listen", Endpoint::default(), "`addr` to listen on", [])
        .unwrap();
    cmd.parse(["--listen", "localhost:8080"]).unwrap();
    assert_eq!(
        endpoint.get(),
        Endpoint {
            host: "localhost".into(),
            port: 8080
        }
    );

    let err = cmd.parse(["--listen", "nowhere"]).unwrap_err();
    assert!(err.to_string().contains("missing port"));
    assert_eq!(endpoint.get().port, 8080);
}

#[test]
fn test_caller_scalar_flag() {
    let mut cmd = app();
    cmd.merge_env([("APP_LOAD", "75%")]).unwrap();
    let load = cmd
        .scalar("load", Percent(50), "target `load`", [env(["APP_LOAD"])])
        .unwrap();
    assert_eq!(load.get(), Percent(75));
    assert_eq!(cmd.lookup("load").unwrap().default_value(), "50%");

    let err = cmd.parse(["--load", "120%"]).unwrap_err();
    assert_eq!(err.value_error(), Some(&ValueError::Range));
    assert_eq!(load.get(), Percent(75));

    cmd.parse(["--load=10%"]).unwrap();
    assert_eq!(load.get(), Percent(10));
}

#[test]
fn test_custom_switch_value() {
    let mut cmd = app();
    let counter = Rc::new(Counter::default());
    cmd.var(counter.clone(), "v", "more output", []).unwrap();
    cmd.parse(["-v", "-v", "-v", "rest"]).unwrap();
    assert_eq!(counter.render(), "3");
    assert_eq!(cmd.args(), ["rest"]);
}

// ---------------------------------------------------------------------------
// Registry queries
// ---------------------------------------------------------------------------

#[test]
fn test_visit_orders() {
    let mut cmd = app();
    cmd.string("zeta", "", "", [alias(["a"])]).unwrap();
    cmd.string("mid", "", "", []).unwrap();
    cmd.parse(["--zeta=1", "-a", "2", "--mid", "3"]).unwrap();

    let mut all = Vec::new();
    cmd.visit_all(|name, _| all.push(name.to_string()));
    assert_eq!(all, ["a", "mid", "zeta"]);

    let mut set = Vec::new();
    cmd.visit(|name, flag| set.push(format!("{name}->{}", flag.name())));
    assert_eq!(set, ["a->zeta", "mid->mid", "zeta->zeta"]);
    assert_eq!(cmd.n_flag(), 3);
}

#[test]
fn test_set_unknown_flag() {
    let mut cmd = app();
    let err = cmd.set("ghost", "1").unwrap_err();
    assert!(matches!(err, FlagError::NoSuchFlag(_)));
}

// ---------------------------------------------------------------------------
// Layered sources
// ---------------------------------------------------------------------------

#[test]
fn test_every_source_respects_choices() {
    let mut cmd = app();
    cmd.install_config(ConfigTree::from_value(json!({"ui": {"theme": "dark"}})).unwrap(), None)
        .unwrap();
    let theme = cmd
        .string(
            "theme",
            "light",
            "",
            [cfg(["ui.theme"]), choices(["light", "dark"]), alias(["t"])],
        )
        .unwrap();
    assert_eq!(theme.get(), "dark");

    for attempt in [cmd.set("theme", "neon"), cmd.set("t", "neon"), cmd.parse(["-t=neon"])] {
        assert!(attempt.unwrap_err().is_enum_violation());
        assert_eq!(theme.get(), "dark");
    }
}

#[test]
fn test_env_then_cfg_then_argument() {
    let mut cmd = app();
    cmd.merge_env([("APP_RETRIES", "5")]).unwrap();
    cmd.install_config(ConfigTree::from_value(json!({"retries": 9})).unwrap(), None)
        .unwrap();

    // Listing order does not matter; cfg is always applied after env.
    let retries = cmd
        .uint("retries", 1, "", [cfg(["retries"]), env(["APP_RETRIES"])])
        .unwrap();
    assert_eq!(retries.get(), 9);

    cmd.parse(["-retries", "2"]).unwrap();
    assert_eq!(retries.get(), 2);
}

#[test]
fn test_env_alone() {
    let mut cmd = app();
    cmd.merge_env([("APP_TIMEOUT", "1m30s")]).unwrap();
    let timeout = cmd
        .duration("timeout", Duration::from_secs(5), "", [env(["APP_TIMEOUT"])])
        .unwrap();
    assert_eq!(timeout.get(), Duration::from_secs(90));
    assert!(cmd.is_set("timeout"));
    assert_eq!(cmd.lookup("timeout").unwrap().default_value(), "5s");
}

#[test]
fn test_cfg_write_back_reaches_whole_tree() {
    let mut root = app();
    let seen = Var::new(String::new());
    let sink = seen.clone();
    root.sub_cmd("sync", "", move |cmd, args| {
        cmd.string("remote", "origin", "", [cfg(["sync.remote"])])?;
        sink.set_value(cmd.context().config().get_text("sync.remote").unwrap_or_default());
        cmd.parse(args)
    });
    root.parse(["sync"]).unwrap();
    assert_eq!(seen.get(), "origin");
    assert_eq!(
        root.context().config().to_value(),
        json!({"sync": {"remote": "origin"}})
    );
}

// ---------------------------------------------------------------------------
// Nested dispatch
// ---------------------------------------------------------------------------

#[test]
fn test_nested_subcommands() {
    let mut root = app();
    let force = Var::new(false);
    let f = force.clone();
    root.sub_cmd("remote", "manage remotes", move |remote, args| {
        let f = f.clone();
        remote.sub_cmd("remove", "remove a remote", move |remove, args| {
            remove.bool_var(&f, "force", false, "", [alias(["f"])])?;
            remove.parse(args)
        });
        remote.parse(args)
    });

    root.parse(["remote", "remove", "-f", "origin"]).unwrap();
    assert!(force.get());

    let remove = root
        .subcommand("remote")
        .and_then(|remote| remote.subcommand("remove"))
        .unwrap();
    assert_eq!(remove.full_name(), "app remote remove");
    assert_eq!(remove.args(), ["origin"]);
}

#[test]
fn test_first_token_with_dash_binds_flags() {
    let mut root = app();
    root.sub_cmd("run", "", |_, _| Err(FlagError::handler("should not run")));
    let verbose = root.bool("verbose", false, "", []).unwrap();
    root.parse(["--verbose", "run"]).unwrap();
    assert!(verbose.get());
    assert_eq!(root.args(), ["run"]);
}

#[test]
fn test_parsed_is_sticky() {
    let mut cmd = app();
    cmd.int("n", 0, "", []).unwrap();
    cmd.parse(["-n", "1"]).unwrap();
    assert!(cmd.parsed());
    assert!(cmd.parse(["-n", "x"]).is_err());
    assert!(cmd.parsed());
}
