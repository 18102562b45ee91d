//! tmux backend.
//!
//! Sessions are tmux panes (`%3`), tabs are tmux windows (`@1`). Target
//! panes are recognised by a case-insensitive substring match against the
//! pane's running command and title. Split geometry comes from the
//! `#{window_layout}` string, e.g.
//!
//!   `b25d,178x48,0,0{89x48,0,0,1,88x48,90,0[88x24,90,0,2,88x23,90,25,3]}`
//!
//! where `{}` groups side-by-side panes, `[]` groups stacked panes, and a
//! trailing number after the geometry triple is the pane id without `%`.

use async_trait::async_trait;
use tokio::process::Command;

use crate::backend::{BackendError, BackendResult, SessionId, TabId, TerminalBackend};
use crate::layout::{LayoutNode, SplitAxis};

pub struct TmuxBackend {
    target_filter: String,
}

impl TmuxBackend {
    pub fn new(target_filter: &str) -> Self {
        Self {
            target_filter: target_filter.to_lowercase(),
        }
    }

    /// Fail fast if no tmux server is reachable. This is the one condition
    /// the daemon treats as fatal at startup.
    pub async fn probe(&self) -> BackendResult<()> {
        self.tmux(&["list-sessions", "-F", "#{session_name}"])
            .await
            .map(|_| ())
    }

    async fn tmux(&self, args: &[&str]) -> BackendResult<String> {
        let output = Command::new("tmux")
            .args(args)
            .output()
            .await
            .map_err(|e| BackendError::Unavailable(format!("failed to run tmux: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Unavailable(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// All panes on the server as (pane, window, lowercased command+title).
    async fn all_panes(&self) -> BackendResult<Vec<(SessionId, TabId, String)>> {
        let out = self
            .tmux(&[
                "list-panes",
                "-a",
                "-F",
                "#{pane_id}\t#{window_id}\t#{pane_current_command}\t#{pane_title}",
            ])
            .await?;
        let mut panes = Vec::new();
        for line in out.lines() {
            let mut fields = line.splitn(4, '\t');
            let (Some(pane), Some(window)) = (fields.next(), fields.next()) else {
                return Err(BackendError::Protocol(format!("bad list-panes line: {line:?}")));
            };
            let rest: String = fields.collect::<Vec<_>>().join("\t").to_lowercase();
            panes.push((SessionId::from(pane), TabId::from(window), rest));
        }
        Ok(panes)
    }
}

#[async_trait]
impl TerminalBackend for TmuxBackend {
    async fn list_target_sessions(&self) -> BackendResult<Vec<SessionId>> {
        Ok(self
            .all_panes()
            .await?
            .into_iter()
            .filter(|(_, _, desc)| desc.contains(&self.target_filter))
            .map(|(pane, _, _)| pane)
            .collect())
    }

    async fn owning_tab(&self, session: &SessionId) -> BackendResult<Option<TabId>> {
        Ok(self
            .all_panes()
            .await?
            .into_iter()
            .find(|(pane, _, _)| pane == session)
            .map(|(_, window, _)| window))
    }

    async fn layout_tree(&self, tab: &TabId) -> BackendResult<LayoutNode> {
        let out = self
            .tmux(&["list-windows", "-a", "-F", "#{window_id}\t#{window_layout}"])
            .await?;
        for line in out.lines() {
            if let Some((window, layout)) = line.split_once('\t') {
                if window == tab.as_str() {
                    return parse_layout(layout);
                }
            }
        }
        Err(BackendError::Protocol(format!("window {tab} not found")))
    }

    async fn focused_session(&self, tab: &TabId) -> BackendResult<Option<SessionId>> {
        let out = self
            .tmux(&[
                "list-panes",
                "-t",
                tab.as_str(),
                "-F",
                "#{pane_id}\t#{pane_active}",
            ])
            .await?;
        for line in out.lines() {
            if let Some((pane, active)) = line.split_once('\t') {
                if active == "1" {
                    return Ok(Some(SessionId::from(pane)));
                }
            }
        }
        Ok(None)
    }

    async fn current_tab(&self) -> BackendResult<Option<TabId>> {
        // The active window of an attached session; display-message would
        // need a client, which the daemon does not have.
        let out = self
            .tmux(&[
                "list-windows",
                "-a",
                "-F",
                "#{session_attached}\t#{window_active}\t#{window_id}",
            ])
            .await?;
        for line in out.lines() {
            let fields: Vec<&str> = line.split('\t').collect();
            if let [attached, active, window] = fields[..] {
                if attached != "0" && active == "1" {
                    return Ok(Some(TabId::from(window)));
                }
            }
        }
        Ok(None)
    }

    async fn activate(&self, session: &SessionId) -> BackendResult<()> {
        // A pane id is a valid window target; this switches the window
        // first, then the pane within it.
        self.tmux(&["select-window", "-t", session.as_str()]).await?;
        self.tmux(&["select-pane", "-t", session.as_str()]).await?;
        Ok(())
    }

    async fn send_text(&self, session: &SessionId, text: &str) -> BackendResult<()> {
        self.tmux(&["send-keys", "-t", session.as_str(), "-l", "--", text])
            .await?;
        Ok(())
    }
}

/// Parse a tmux `#{window_layout}` string into a split tree.
pub fn parse_layout(layout: &str) -> BackendResult<LayoutNode> {
    // The leading "xxxx," is a checksum over the rest of the string.
    let body = match layout.split_once(',') {
        Some((checksum, rest))
            if checksum.len() == 4 && checksum.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            rest
        }
        _ => layout,
    };
    let mut parser = LayoutParser {
        input: body.as_bytes(),
        pos: 0,
    };
    let node = parser.node()?;
    if parser.pos != parser.input.len() {
        return Err(BackendError::Protocol(format!(
            "trailing garbage in layout {layout:?}"
        )));
    }
    Ok(node)
}

struct LayoutParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl LayoutParser<'_> {
    fn node(&mut self) -> BackendResult<LayoutNode> {
        self.dimensions()?;
        match self.peek() {
            Some(b'{') => self.children(b'{', b'}', SplitAxis::Horizontal),
            Some(b'[') => self.children(b'[', b']', SplitAxis::Vertical),
            Some(b',') => {
                self.pos += 1;
                let id = self.number()?;
                Ok(LayoutNode::Leaf(SessionId::from(format!("%{id}"))))
            }
            other => Err(self.unexpected(other)),
        }
    }

    /// `WxH,X,Y` preceding every node. The values themselves are unused;
    /// relative placement comes from the tree shape.
    fn dimensions(&mut self) -> BackendResult<()> {
        self.number()?;
        self.expect(b'x')?;
        self.number()?;
        self.expect(b',')?;
        self.number()?;
        self.expect(b',')?;
        self.number()?;
        Ok(())
    }

    fn children(
        &mut self,
        open: u8,
        close: u8,
        axis: SplitAxis,
    ) -> BackendResult<LayoutNode> {
        self.expect(open)?;
        let mut children = vec![self.node()?];
        loop {
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    children.push(self.node()?);
                }
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(LayoutNode::Split { axis, children });
                }
                other => return Err(self.unexpected(other)),
            }
        }
    }

    fn number(&mut self) -> BackendResult<u64> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            let found = self.peek();
            return Err(self.unexpected(found));
        }
        // Only ascii digits between start and pos.
        std::str::from_utf8(&self.input[start..self.pos])
            .unwrap_or("")
            .parse()
            .map_err(|_| BackendError::Protocol("layout number out of range".to_string()))
    }

    fn expect(&mut self, expected: u8) -> BackendResult<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            other => Err(self.unexpected(other)),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn unexpected(&self, found: Option<u8>) -> BackendError {
        match found {
            Some(c) => BackendError::Protocol(format!(
                "unexpected {:?} at offset {} in layout",
                c as char, self.pos
            )),
            None => BackendError::Protocol("layout string truncated".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str) -> LayoutNode {
        LayoutNode::Leaf(SessionId::from(id))
    }

    #[test]
    fn test_single_pane_layout() {
        let node = parse_layout("bb62,80x24,0,0,0").unwrap();
        assert_eq!(node, leaf("%0"));
    }

    #[test]
    fn test_side_by_side_layout() {
        let node = parse_layout("89x24,0,0{44x24,0,0,1,44x24,45,0,2}").unwrap();
        assert_eq!(
            node,
            LayoutNode::Split {
                axis: SplitAxis::Horizontal,
                children: vec![leaf("%1"), leaf("%2")],
            }
        );
    }

    #[test]
    fn test_stacked_layout() {
        let node = parse_layout("5d33,80x24,0,0[80x12,0,0,1,80x11,0,13,4]").unwrap();
        assert_eq!(
            node,
            LayoutNode::Split {
                axis: SplitAxis::Vertical,
                children: vec![leaf("%1"), leaf("%4")],
            }
        );
    }

    #[test]
    fn test_nested_layout() {
        // Left column is one tall pane, right column is two stacked panes.
        let node = parse_layout(
            "b25d,178x48,0,0{89x48,0,0,1,88x48,90,0[88x24,90,0,2,88x23,90,25,3]}",
        )
        .unwrap();
        assert_eq!(
            node,
            LayoutNode::Split {
                axis: SplitAxis::Horizontal,
                children: vec![
                    leaf("%1"),
                    LayoutNode::Split {
                        axis: SplitAxis::Vertical,
                        children: vec![leaf("%2"), leaf("%3")],
                    },
                ],
            }
        );
    }

    #[test]
    fn test_three_columns() {
        let node =
            parse_layout("120x30,0,0{40x30,0,0,5,39x30,41,0,6,39x30,81,0,7}").unwrap();
        assert_eq!(
            node,
            LayoutNode::Split {
                axis: SplitAxis::Horizontal,
                children: vec![leaf("%5"), leaf("%6"), leaf("%7")],
            }
        );
    }

    #[test]
    fn test_malformed_layouts_are_protocol_errors() {
        assert!(parse_layout("").is_err());
        assert!(parse_layout("80x24,0,0").is_err());
        assert!(parse_layout("80x24,0,0{44x24,0,0,1").is_err());
        assert!(parse_layout("80x24,0,0,1garbage").is_err());
        assert!(parse_layout("banana").is_err());
    }
}
