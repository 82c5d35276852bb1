use super::*;

/// One emitted result for a (key, window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedPane<K, OUT> {
    pub key: K,
    pub window: TimeWindow,
    pub value: OUT,
    /// Output timestamp; never earlier than the window's hold.
    pub timestamp: EventTime,
    pub pane: PaneInfo,
}

impl<K, OUT> WindowedPane<K, OUT> {
    /// Re-wrap the pane as an element for a downstream stage, keeping its
    /// window and pane metadata.
    pub fn into_windowed_value(self) -> WindowedValue<(K, OUT)> {
        WindowedValue {
            value: (self.key, self.value),
            timestamp: self.timestamp,
            windows: vec![self.window],
            pane: Some(self.pane),
            id: None,
        }
    }
}

impl<K: std::fmt::Debug, OUT: std::fmt::Debug> std::fmt::Display for WindowedPane<K, OUT> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "key={:?} {} value={:?} ts={} pane#{} {:?}",
            self.key, self.window, self.value, self.timestamp, self.pane.index, self.pane.timing
        )?;
        if self.pane.is_last {
            f.write_str(" (final)")?;
        }
        Ok(())
    }
}
