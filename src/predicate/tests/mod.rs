// Tests for the bounding-box predicate and its three evaluation forms.
