#[derive(Debug, Default)]
struct PushdownPlan {
    /// Filters pre-applied inside each occurrence's derived source.
    pushed: Vec<Option<LogicalGroup>>,
    /// What is left for the outer WHERE/HAVING.
    remaining: LogicalGroup,
}

impl PushdownPlan {
    fn pushed_for(&self, index: usize) -> Option<&LogicalGroup> {
        self.pushed.get(index).and_then(Option::as_ref)
    }

    fn weights(&self) -> Vec<usize> {
        self.pushed
            .iter()
            .map(|group| group.as_ref().map_or(0, count_leaves))
            .collect()
    }
}

fn count_leaves(group: &LogicalGroup) -> usize {
    group
        .conditions
        .iter()
        .map(|child| match child {
            FilterNode::Condition(_) => 1,
            FilterNode::Group(nested) => count_leaves(nested),
        })
        .sum()
}

impl QueryCompiler<'_> {
    fn plan_pushdown(&self, scope: &QueryScope<'_>) -> PushdownPlan {
        let occurrences = scope.sources.occurrences.len();
        let mut plan = PushdownPlan {
            pushed: vec![None; occurrences],
            remaining: scope.request.filters.clone().unwrap_or_default(),
        };

        for target in 0..occurrences {
            if plan.remaining.is_empty() {
                break;
            }
            if scope.sources.occurrences[target].null_supplying {
                continue;
            }

            let (pushed, remaining) = self.split_group(scope, &plan.remaining, target);
            if !pushed.is_empty() {
                debug!(
                    alias = %scope.sources.occurrences[target].alias,
                    predicates = count_leaves(&pushed),
                    "pushing filters into derived source"
                );
                plan.pushed[target] = Some(pushed);
            }
            plan.remaining = remaining;
        }

        plan
    }

    fn pushable(&self, scope: &QueryScope<'_>, condition: &FilterCondition, target: usize) -> bool {
        if scope.aggregates.get(&condition.column).is_some() || condition.column.trim().is_empty() {
            return false;
        }
        matches!(
            scope.sources.resolve_column(&condition.column),
            Some((index, _)) if index == target
        )
    }

    fn fully_pushable(&self, scope: &QueryScope<'_>, group: &LogicalGroup, target: usize) -> bool {
        group.conditions.iter().all(|child| match child {
            FilterNode::Condition(condition) => self.pushable(scope, condition, target),
            FilterNode::Group(nested) => self.fully_pushable(scope, nested, target),
        })
    }

    /// Returns `(pushed, remaining)` for one target occurrence.
    ///
    /// AND children split independently. An OR group moves only when every
    /// leaf under it belongs to the target.
    fn split_group(
        &self,
        scope: &QueryScope<'_>,
        group: &LogicalGroup,
        target: usize,
    ) -> (LogicalGroup, LogicalGroup) {
        match group.logic {
            Logic::Or => {
                if !group.is_empty() && self.fully_pushable(scope, group, target) {
                    (group.clone(), LogicalGroup::new(Logic::Or, Vec::new()))
                } else {
                    (LogicalGroup::new(Logic::And, Vec::new()), group.clone())
                }
            }
            Logic::And => {
                let mut pushed = Vec::new();
                let mut remaining = Vec::new();
                for child in &group.conditions {
                    match child {
                        FilterNode::Condition(condition) => {
                            if self.pushable(scope, condition, target) {
                                pushed.push(child.clone());
                            } else {
                                remaining.push(child.clone());
                            }
                        }
                        // neutral under AND
                        FilterNode::Group(nested) if nested.is_empty() => {}
                        FilterNode::Group(nested) => {
                            let (nested_pushed, nested_remaining) =
                                self.split_group(scope, nested, target);
                            if !nested_pushed.is_empty() {
                                pushed.push(FilterNode::Group(nested_pushed));
                            }
                            if !nested_remaining.is_empty() {
                                remaining.push(FilterNode::Group(nested_remaining));
                            }
                        }
                    }
                }
                (
                    LogicalGroup::new(Logic::And, pushed),
                    LogicalGroup::new(Logic::And, remaining),
                )
            }
        }
    }
}
